use crate::config::Filter;

/// Render a WQL query for the given class, properties, and filters.
///
/// Filter values are single-quoted verbatim, with no escaping. Values
/// containing quotes will produce a malformed query; the service rejects
/// it and the poll degrades to an empty sample.
pub fn build_query(class_name: &str, properties: &[String], filters: &[Filter]) -> String {
    format!(
        "Select {} from {}{}",
        properties.join(","),
        class_name,
        format_filters(filters)
    )
}

/// Render a filter list as a WHERE clause, conjuncts in input order.
/// An empty list produces no clause at all.
fn format_filters(filters: &[Filter]) -> String {
    if filters.is_empty() {
        return String::new();
    }

    let clause = filters
        .iter()
        .map(|filter| format!("{} = '{}'", filter.property(), filter.value()))
        .collect::<Vec<_>>()
        .join(" AND ");

    format!(" WHERE {clause}")
}
