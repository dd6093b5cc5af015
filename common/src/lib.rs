//! fieldlog Common Library
//!
//! CLIと（将来の）Webフロントエンドで共有される型と純粋な変換

pub mod types;
pub mod error;
pub mod record;
pub mod address;

pub use types::{
    AddressRecord, CellValue, LatLon, PhotoRef, RouteSummary, Row, SheetData, TreeChoice,
    TreeRecord, WorkOrderFields,
};
pub use error::{Error, Result};
pub use record::{build_address_records, build_address_records_with_headers, is_restated_header};
pub use address::{display_address, extract_simple_address, maps_deep_link, DEFAULT_MAPS_BASE};
