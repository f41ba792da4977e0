use crate::config::Config;
use crate::db::DbPool;
use crate::listings::{BusyListings, GradingStrategy, ListingHub};
use crate::ocr::OcrEngine;
use crate::storage::BlobStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub blobs: Arc<dyn BlobStore>,
    pub ocr: Arc<dyn OcrEngine>,
    pub grader: Arc<dyn GradingStrategy>,
    pub listing_hub: ListingHub,
    pub busy: BusyListings,
}
