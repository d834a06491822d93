#![forbid(unsafe_code)]

use crate::ontology::DataType;

/// SQL expression producing the canonical string form of a stored value.
///
/// `column` must already be a qualified, quoted column reference. Returns
/// `None` for datatypes the relation never surfaces.
pub(crate) fn object_expr(data_type: DataType, column: &str) -> Option<String> {
    let expr = match data_type {
        DataType::String | DataType::Integer => column.to_string(),
        DataType::Resource => format!("(SELECT Uri FROM Resource WHERE ID = {column})"),
        DataType::Boolean => {
            format!("CASE {column} WHEN 1 THEN 'true' WHEN 0 THEN 'false' ELSE NULL END")
        }
        DataType::Date => format!("strftime('%Y-%m-%d', {column}, 'unixepoch')"),
        DataType::DateTime => format!("strftime('%Y-%m-%dT%H:%M:%SZ', {column}, 'unixepoch')"),
        DataType::Unbound => return None,
    };
    Some(expr)
}
