pub mod app;
pub mod clinical;
pub mod compare;
pub mod config;
pub mod copy_number;
pub mod correlation;
pub mod domain;
pub mod download;
pub mod envelope;
pub mod error;
pub mod expression;
pub mod flatten;
pub mod gdc;
pub mod lookup;
pub mod matrix;
pub mod output;
pub mod report;
pub mod survival;
