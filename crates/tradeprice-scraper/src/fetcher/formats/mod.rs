//! Extraction strategy implementations for the store fetcher.

mod embed;
mod interactive;
mod network;
mod region;
mod visible;

pub(crate) use embed::extract_balanced;
pub(super) use embed::extract_embedded_stores;
pub(super) use interactive::fetch_filtered_stores;
pub(super) use network::fetch_network_stores;
pub(super) use region::fetch_region_stores;
pub(super) use visible::extract_visible_stores;
pub(crate) use visible::{element_text, parse_selector};
