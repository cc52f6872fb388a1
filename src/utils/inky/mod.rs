//! Inky markup expansion.
//!
//! Replaces the Foundation for Emails component tags (`<container>`, `<row>`,
//! `<columns>`, `<button>`, ...) with the nested tables email clients
//! understand. Everything that is not a component, including broken markup,
//! passes through unchanged.

mod components;
pub mod tree;

use anyhow::Result;
use components::Siblings;
use std::borrow::Cow;
use tree::{Element, Node};

/// Components whose content is expanded and wrapped in table markup.
const WRAPPING_COMPONENTS: &[&str] = &[
    "container",
    "row",
    "columns",
    "button",
    "callout",
    "wrapper",
    "menu",
    "item",
    "block-grid",
];

/// Component expander.
#[derive(Debug, Clone, Copy)]
pub struct Inky {
    column_count: u32,
}

impl Inky {
    pub const fn new(column_count: u32) -> Self {
        Self { column_count }
    }

    /// Expand every component in `html`.
    pub fn expand(&self, html: &str) -> Result<String> {
        let source = tree::mask_stray_lt(html);
        let masked = matches!(source, Cow::Owned(_));
        let mut nodes = tree::parse(&source)?;
        let mut out = String::with_capacity(html.len() * 2);
        self.render_nodes(&mut nodes, &mut out);
        Ok(if masked { tree::unmask_stray_lt(out) } else { out })
    }

    fn render_nodes(&self, nodes: &mut [Node<'_>], out: &mut String) {
        let siblings = sibling_info(nodes);
        let mut index = 0;
        for node in nodes.iter_mut() {
            match node {
                Node::Raw(text) => out.push_str(text),
                Node::Element(el) => {
                    self.render_element(el, siblings[index], out);
                    index += 1;
                }
            }
        }
    }

    fn render_inner(&self, el: &mut Element<'_>) -> String {
        let mut inner = String::new();
        self.render_nodes(&mut el.children, &mut inner);
        inner
    }

    fn render_element(&self, el: &mut Element<'_>, siblings: Siblings, out: &mut String) {
        // Half-open components are left as they are
        if !el.is_complete() {
            self.render_plain(el, out);
            return;
        }

        match el.name.as_str() {
            "raw" => tree::write_nodes(&el.children, out),
            "center" => {
                center(el);
                self.render_plain(el, out);
            }
            "spacer" => out.push_str(&components::spacer(el)),
            "h-line" => out.push_str(&components::h_line(el)),
            name if WRAPPING_COMPONENTS.contains(&name) => {
                let inner = self.render_inner(el);
                let html = match el.name.as_str() {
                    "container" => components::container(el, &inner),
                    "row" => components::row(el, &inner),
                    "columns" => components::columns(el, &inner, siblings, self.column_count),
                    "button" => components::button(el, &inner),
                    "callout" => components::callout(el, &inner),
                    "wrapper" => components::wrapper(el, &inner),
                    "menu" => components::menu(el, &inner),
                    "item" => components::menu_item(el, &inner),
                    _ => components::block_grid(el, &inner),
                };
                out.push_str(&html);
            }
            _ => self.render_plain(el, out),
        }
    }

    /// Keep the element's own tags, expand its content.
    fn render_plain(&self, el: &mut Element<'_>, out: &mut String) {
        el.write_open(out);
        self.render_nodes(&mut el.children, out);
        el.write_close(out);
    }
}

/// `<center>` stays in place: its children are centered, and menu items
/// anywhere below it float to the center.
fn center(el: &mut Element<'_>) {
    for child in el.child_elements_mut() {
        child.set_attr("align", "center");
        child.add_class("float-center");
    }
    el.for_each_descendant_mut(&mut |e| {
        if e.name == "item" || e.has_class("menu-item") {
            e.add_class("float-center");
        }
    });
    el.set_attr("data-parsed", "");
}

/// Position info for every element in `nodes`, in order.
fn sibling_info(nodes: &[Node<'_>]) -> Vec<Siblings> {
    let elements: Vec<&Element<'_>> = nodes
        .iter()
        .filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Raw(_) => None,
        })
        .collect();
    let is_columns = |i: Option<&&Element<'_>>| i.is_some_and(|el| el.name == "columns");

    (0..elements.len())
        .map(|k| Siblings {
            count: elements.len(),
            prev_is_columns: k > 0 && is_columns(elements.get(k - 1)),
            next_is_columns: is_columns(elements.get(k + 1)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(html: &str) -> String {
        Inky::new(12).expand(html).unwrap()
    }

    #[test]
    fn test_plain_markup_is_untouched() {
        let html = "<!DOCTYPE html>\n<html><head><!-- <style> --></head>\
            <body><p class=\"lead\">Terms &amp; conditions & more</p><br></body></html>\n";
        assert_eq!(expand(html), html);
    }

    #[test]
    fn test_single_column_row() {
        assert_eq!(
            expand("<row><columns>Hi</columns></row>"),
            "<table class=\"row\"><tbody><tr>\
             <th class=\"small-12 large-12 columns first last\"><table><tbody><tr><th>Hi</th>\
             \n<th class=\"expander\"></th></tr></tbody></table></th>\
             </tr></tbody></table>"
        );
    }

    #[test]
    fn test_two_columns() {
        assert_eq!(
            expand("<row><columns large=\"6\">A</columns> <columns large=\"6\">B</columns></row>"),
            "<table class=\"row\"><tbody><tr>\
             <th class=\"small-12 large-6 columns first\"><table><tbody><tr><th>A</th></tr></tbody></table></th> \
             <th class=\"small-12 large-6 columns last\"><table><tbody><tr><th>B</th></tr></tbody></table></th>\
             </tr></tbody></table>"
        );
    }

    #[test]
    fn test_column_sizes_default_from_sibling_count() {
        let out = expand("<row><columns>A</columns><columns small=\"12\">B</columns><columns>C</columns></row>");
        assert!(out.contains("class=\"small-12 large-4 columns first\""));
        assert!(out.contains("class=\"small-12 large-12 columns\""));
        assert!(out.contains("class=\"small-12 large-4 columns last\""));
    }

    #[test]
    fn test_nested_row_suppresses_expander() {
        let out = expand(
            "<container><row><columns><row><columns>x</columns></row></columns></row></container>",
        );
        assert_eq!(out.matches("class=\"expander\"").count(), 1);
        assert!(out.starts_with("<table align=\"center\" class=\"container\">"));
    }

    #[test]
    fn test_no_expander() {
        let out = expand("<columns no-expander>x</columns>");
        assert!(!out.contains("expander"));
        let out = expand("<columns no-expander=\"false\">x</columns>");
        assert!(out.contains("class=\"expander\""));
    }

    #[test]
    fn test_button_with_link() {
        assert_eq!(
            expand("<button href=\"https://example.com\" class=\"small\">Go</button>"),
            "<table class=\"button small\"><tbody><tr><td><table><tbody><tr><td>\
             <a href=\"https://example.com\">Go</a>\
             </td></tr></tbody></table></td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_expanded_button() {
        let out = expand("<button class=\"expanded\" href=\"#\" target=\"_blank\">Go</button>");
        assert!(out.contains("<center><a href=\"#\" target=\"_blank\">Go</a></center>"));
        assert!(out.contains("<td class=\"expander\"></td>"));
    }

    #[test]
    fn test_spacer() {
        assert_eq!(
            expand("<spacer></spacer>"),
            "<table class=\"spacer\"><tbody><tr><td height=\"16\" \
             style=\"font-size:16px;line-height:16px;\">&nbsp;</td></tr></tbody></table>"
        );
        assert!(expand("<spacer size=\"8\" />").contains("height=\"8\""));
    }

    #[test]
    fn test_responsive_spacer() {
        let out = expand("<spacer size-sm=\"10\" size-lg=\"20\"></spacer>");
        assert!(out.contains("class=\"spacer hide-for-large\""));
        assert!(out.contains("height=\"10\""));
        assert!(out.contains("class=\"spacer show-for-large\""));
        assert!(out.contains("height=\"20\""));
    }

    #[test]
    fn test_center_menu() {
        assert_eq!(
            expand("<center><menu><item href=\"#\">A</item></menu></center>"),
            "<center data-parsed=\"\">\
             <table align=\"center\" class=\"menu float-center\"><tbody><tr><td><table><tbody><tr>\
             <th class=\"menu-item float-center\"><a href=\"#\">A</a></th>\
             </tr></tbody></table></td></tr></tbody></table>\
             </center>"
        );
    }

    #[test]
    fn test_callout_and_wrapper_keep_extra_attrs() {
        let out = expand("<callout class=\"primary\" id=\"note\">Hi</callout>");
        assert!(out.starts_with("<table id=\"note\" class=\"callout\">"));
        assert!(out.contains("<th class=\"callout-inner primary\">Hi</th>"));

        let out = expand("<wrapper class=\"header\" bgcolor=\"#8a8a8a\">x</wrapper>");
        assert!(out.starts_with("<table bgcolor=\"#8a8a8a\" class=\"wrapper header\" align=\"center\">"));
        assert!(out.contains("<td class=\"wrapper-inner\">x</td>"));
    }

    #[test]
    fn test_raw_content_is_not_expanded() {
        assert_eq!(expand("<raw><row>keep</row></raw>"), "<row>keep</row>");
    }

    #[test]
    fn test_h_line_and_block_grid() {
        assert_eq!(
            expand("<h-line></h-line>"),
            "<table class=\"h-line\"><tr><th>&nbsp;</th></tr></table>"
        );
        assert_eq!(
            expand("<block-grid up=\"3\">x</block-grid>"),
            "<table class=\"block-grid up-3\"><tbody><tr>x</tr></tbody></table>"
        );
    }

    #[test]
    fn test_unclosed_component_is_left_alone() {
        assert_eq!(expand("<div><row>text</div>"), "<div><row>text</div>");
    }

    #[test]
    fn test_template_tokens_survive() {
        let html = "<columns><TMPL_VAR name>{{ x }}</columns>";
        assert!(expand(html).contains("<th><TMPL_VAR name>{{ x }}</th>"));
    }

    #[test]
    fn test_bare_less_than_is_text() {
        let out = expand("<row><columns>price < 5</columns></row>");
        assert!(!out.contains("<columns>"), "{out}");
        assert!(out.contains("price < 5"), "{out}");
        assert!(out.contains("<th class=\"small-12 large-12 columns first last\">"), "{out}");

        assert_eq!(expand("<p>a <= b</p>"), "<p>a <= b</p>");
    }
}
