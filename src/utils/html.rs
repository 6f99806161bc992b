// src/utils/html.rs

/// Cleans topic descriptions authored by lecturers.
///
/// Whitelist-based: safe tags (<p>, <b>, lists, links) survive, while <script>
/// and <style> are removed together with their content and event-handler
/// attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
