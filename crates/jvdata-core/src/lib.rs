// jvdata-core: JRA-VAN fixed-length record codec.
//
// Decodes the Shift-JIS fixed-length records delivered by the JV-Link data
// service into strongly-typed domain values. The crate is pure and stateless:
// bytes in, typed records (or precise errors) out. Session handling lives in
// jvlink-core.

pub mod codes;
pub mod fieldspec;
pub mod ids;
pub mod records;
pub mod text;
pub mod watch;

pub use fieldspec::{DateFormat, FieldEncoding, FieldMap, FieldSpec, FieldValue, RecordError};
pub use ids::{RaceId, RunnerId};
pub use records::{ParsedRecord, parse_all, parse_collecting, parse_record, record_kind};
pub use watch::{WatchEvent, WatchEventKind};
