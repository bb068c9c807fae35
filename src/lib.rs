//! Client for the FitForm squat analysis service.
//!
//! A submission uploads a video to the analysis endpoint, then asks the feedback
//! endpoint for coaching on the counted squats. [`orchestrator::UploadOrchestrator`]
//! drives that sequence and [`presenter::ResultPresenter`] renders each step.

pub mod cli;
pub mod engine;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod presenter;
pub mod storage;
