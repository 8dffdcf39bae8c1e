/// Graphite dot-notation name: `{target}.{value}...{value}.{lowercase metric name}`.
///
/// Values are joined in the given order. Empty segments are kept as is, so an empty value list
/// produces an empty path component (`target..name`).
pub fn series_name<'a, V>(target: &str, values: V, metric_name: &str) -> String
    where V: IntoIterator<Item = &'a str>
{
    let values: Vec<&str> = values.into_iter().collect();
    format!("{target}.{}.{}", values.join("."), metric_name.to_lowercase())
}
