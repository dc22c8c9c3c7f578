//! Attribute-based DOM traversal used by click-target resolution.

use std::rc::Rc;

use crate::host::Element;

/// Marks an element as a tracked button; its value is the reported event name.
pub const BUTTON_ATTR: &str = "m_btn";
/// Marks an element as a named step of the logical page path.
pub const PATH_ATTR: &str = "m_p";
/// Optional reported event value of a tracked button.
pub const VALUE_ATTR: &str = "m_val";

/// Ancestors of `element` (excluding itself) carrying `key`, nearest first.
pub fn parents_with_attribute(element: &dyn Element, key: &str) -> Vec<Rc<dyn Element>> {
    let mut found = Vec::new();
    let mut current = element.parent();
    while let Some(node) = current {
        if node.has_attribute(key) {
            found.push(Rc::clone(&node));
        }
        current = node.parent();
    }
    found
}

/// Label of one path step: `m_p`, else `m_btn`, else trimmed text.
pub fn path_label(element: &dyn Element) -> String {
    element
        .attribute(PATH_ATTR)
        .filter(|v| !v.is_empty())
        .or_else(|| element.attribute(BUTTON_ATTR).filter(|v| !v.is_empty()))
        .unwrap_or_else(|| element.text().trim().to_string())
}

/// Path descriptor for an ordered element list, order preserved.
pub fn path_descriptor(elements: &[Rc<dyn Element>]) -> Vec<String> {
    elements.iter().map(|e| path_label(e.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryElement;

    #[test]
    fn test_parents_nearest_first() {
        let page = MemoryElement::new().with_attr(PATH_ATTR, "checkout").build();
        let plain = MemoryElement::new().inside(&page).build();
        let card = MemoryElement::new()
            .with_attr(PATH_ATTR, "summary")
            .inside(&plain)
            .build();
        let button = MemoryElement::new().with_text("Pay").inside(&card).build();

        let parents = parents_with_attribute(&*button, PATH_ATTR);
        assert_eq!(path_descriptor(&parents), vec!["summary", "checkout"]);
    }

    #[test]
    fn test_path_label_fallbacks() {
        let named = MemoryElement::new().with_attr(BUTTON_ATTR, "buy").build();
        let texty = MemoryElement::new().with_text("  Add to cart ").build();
        assert_eq!(path_label(&*named), "buy");
        assert_eq!(path_label(&*texty), "Add to cart");
    }
}
