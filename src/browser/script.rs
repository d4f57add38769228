//! JavaScript snippets used to resolve locators inside the page
//!
//! Every snippet is a self-contained expression so it can be sent through
//! `Runtime.evaluate` as-is.

use super::Locator;

/// Quote a Rust string as a JavaScript string literal
pub fn js_string(value: &str) -> String {
    // JSON string literals are valid JavaScript string literals
    serde_json::Value::String(value.to_string()).to_string()
}

/// Expression evaluating to the first element matching the locator, or null
pub fn element_expr(locator: &Locator) -> String {
    match locator {
        Locator::Css { selector } => {
            format!("document.querySelector({})", js_string(selector))
        }
        Locator::Text { text } => format!(
            "(Array.from(document.querySelectorAll('body *')).find((el) => \
             (el.textContent || '').trim() === {}) || null)",
            js_string(text)
        ),
        Locator::HasText { tag, text } => format!(
            "(Array.from(document.querySelectorAll({})).find((el) => \
             (el.textContent || '').toLowerCase().includes({})) || null)",
            js_string(tag),
            js_string(&text.to_lowercase())
        ),
    }
}

pub fn presence_script(locator: &Locator) -> String {
    format!("(() => {} !== null)()", element_expr(locator))
}

pub fn click_script(locator: &Locator) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
        element_expr(locator)
    )
}

/// Sets the value through the native setter so framework listeners see the input
pub fn fill_script(locator: &Locator, value: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; \
         el.focus(); \
         const setter = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value'); \
         if (setter && setter.set) {{ setter.set.call(el, {value}); }} else {{ el.value = {value}; }} \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
         return true; }})()",
        element_expr(locator),
        value = js_string(value)
    )
}

pub fn attribute_script(locator: &Locator, name: &str) -> String {
    format!(
        "(() => {{ const el = {}; return el ? el.getAttribute({}) : null; }})()",
        element_expr(locator),
        js_string(name)
    )
}

pub fn text_script(locator: &Locator) -> String {
    format!(
        "(() => {{ const el = {}; return el ? el.textContent : null; }})()",
        element_expr(locator)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r#"button:has("x")"#), r#""button:has(\"x\")""#);
    }

    #[test]
    fn test_css_locator_uses_query_selector() {
        let expr = element_expr(&Locator::css("[data-participant-id]"));
        assert_eq!(expr, r#"document.querySelector("[data-participant-id]")"#);
    }

    #[test]
    fn test_has_text_lowercases_needle() {
        let expr = element_expr(&Locator::has_text("button", "Join now"));
        assert!(expr.contains(r#"querySelectorAll("button")"#));
        assert!(expr.contains(r#""join now""#));
    }

    #[test]
    fn test_fill_script_embeds_value_once_quoted() {
        let script = fill_script(&Locator::css("input"), "Loqa \"Bot\"");
        assert!(script.contains(r#""Loqa \"Bot\"""#));
        assert!(script.starts_with("(() =>"));
    }
}
