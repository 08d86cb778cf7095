//! Mini-language parsers: derived-column CASE rules, filter expressions and
//! target date formats. Each produces a typed value; nothing here touches a DataFrame.

pub mod query_common;
pub mod query_parse_case;
pub mod query_parse_date_format;
pub mod query_parse_filter;

pub use query_common::*;
pub use query_parse_case::*;
pub use query_parse_date_format::*;
pub use query_parse_filter::*;
