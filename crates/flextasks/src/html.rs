use flexcore::TaskError;
use scraper::{Html, Selector};

// `Html` is not `Send`; keep every parse inside a synchronous helper so no
// executor future holds one across an await.

fn parse_selector(selector: &str) -> Result<Selector, TaskError> {
    Selector::parse(selector).map_err(|e| TaskError::InvalidInputType {
        field: "Selector".to_string(),
        expected: "CSS selector".to_string(),
        actual: format!("{:?}", e),
    })
}

/// Trimmed text of the first element matching `selector`
pub fn select_text(html: &str, selector: &str) -> Result<Option<String>, TaskError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let text = document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string());
    Ok(text)
}

pub fn contains(html: &str, selector: &str) -> Result<bool, TaskError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let found = document.select(&selector).next().is_some();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <h1>  Price list </h1>
        <ul><li class="price">12.50</li><li class="price">9.99</li></ul>
    </body></html>"#;

    #[test]
    fn selects_first_match() {
        assert_eq!(select_text(PAGE, "h1").unwrap().as_deref(), Some("Price list"));
        assert_eq!(select_text(PAGE, "li.price").unwrap().as_deref(), Some("12.50"));
        assert_eq!(select_text(PAGE, "table").unwrap(), None);
    }

    #[test]
    fn rejects_bad_selector() {
        assert!(select_text(PAGE, "li[").is_err());
        assert!(contains(PAGE, "ul > li").unwrap());
    }
}
