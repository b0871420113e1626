use ammonia;

/// Clean instructor-supplied HTML (lesson bodies, course descriptions).
///
/// Whitelist-based sanitization: safe formatting tags survive, <script>,
/// <iframe> and event-handler attributes are stripped. Learners see lesson
/// content rendered as HTML, so this is the stored-XSS barrier.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
