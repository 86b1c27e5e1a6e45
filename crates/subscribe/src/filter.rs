/// Check whether notifications may go out over `api`.
///
/// An empty list enables every API, as do the entries `all` and `any`.
/// Other entries match exactly or as a prefix, so `imessage` also enables
/// `imessage-work`.
pub fn api_enabled(api: &str, enabled: &[String]) -> bool {
    if enabled.is_empty() {
        return true;
    }
    enabled
        .iter()
        .any(|entry| entry == "all" || entry == "any" || api.starts_with(entry.as_str()))
}
