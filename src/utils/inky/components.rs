//! Table markup for each Inky component.
//!
//! Each function receives the component element and its already expanded
//! content, and returns the replacement markup.

use super::tree::{Element, push_attr};

/// Attributes consumed by the components themselves; everything else is
/// copied onto the generated table.
const CONSUMED_ATTRS: &[&str] = &[
    "class",
    "href",
    "size",
    "size-sm",
    "size-lg",
    "large",
    "small",
    "no-expander",
    "target",
];

const EXPANDER_TH: &str = "\n<th class=\"expander\"></th>";
const EXPANDER_TD: &str = "\n<td class=\"expander\"></td>";

/// Where a `<columns>` sits among its parent's element children.
#[derive(Debug, Clone, Copy, Default)]
pub struct Siblings {
    /// Element children of the parent, this one included.
    pub count: usize,
    pub prev_is_columns: bool,
    pub next_is_columns: bool,
}

/// Pass-through attributes, each with a leading space.
fn passthrough(el: &Element<'_>) -> String {
    let mut out = String::new();
    for (key, value) in el.attrs() {
        if !CONSUMED_ATTRS.contains(&key.as_str()) {
            push_attr(&mut out, key, value);
        }
    }
    out
}

/// `base` classes followed by the element's own.
fn class_list(base: &[&str], el: &Element<'_>) -> String {
    base.iter()
        .copied()
        .chain(el.classes())
        .collect::<Vec<_>>()
        .join(" ")
}

fn target(el: &Element<'_>) -> String {
    let mut out = String::new();
    if let Some(target) = el.attr("target") {
        push_attr(&mut out, "target", target);
    }
    out
}

pub fn container(el: &Element<'_>, inner: &str) -> String {
    format!(
        "<table{} align=\"center\" class=\"{}\"><tbody><tr><td>{inner}</td></tr></tbody></table>",
        passthrough(el),
        class_list(&["container"], el),
    )
}

pub fn row(el: &Element<'_>, inner: &str) -> String {
    format!(
        "<table{} class=\"{}\"><tbody><tr>{inner}</tr></tbody></table>",
        passthrough(el),
        class_list(&["row"], el),
    )
}

pub fn columns(el: &Element<'_>, inner: &str, siblings: Siblings, column_count: u32) -> String {
    let per_column = column_count / u32::try_from(siblings.count.max(1)).unwrap_or(u32::MAX);
    let small = el
        .attr("small")
        .map_or_else(|| column_count.to_string(), str::to_owned);
    let large = el
        .attr("large")
        .or_else(|| el.attr("small"))
        .map_or_else(|| per_column.to_string(), str::to_owned);

    let small_class = format!("small-{small}");
    let large_class = format!("large-{large}");
    let mut base = vec![small_class.as_str(), large_class.as_str(), "columns"];
    if !siblings.prev_is_columns {
        base.push("first");
    }
    if !siblings.next_is_columns {
        base.push("last");
    }

    let full_width = large.trim().parse::<u32>().ok() == Some(column_count);
    let has_row = el.any_descendant(&|e: &Element<'_>| e.name == "row" || e.has_class("row"));
    let expander_allowed = el.attr("no-expander").is_none_or(|v| v == "false");
    let expander = if full_width && !has_row && expander_allowed {
        EXPANDER_TH
    } else {
        ""
    };

    format!(
        "<th class=\"{}\"{}><table><tbody><tr><th>{inner}</th>{expander}</tr></tbody></table></th>",
        class_list(&base, el),
        passthrough(el),
    )
}

pub fn button(el: &Element<'_>, inner: &str) -> String {
    let mut inner = match el.attr("href") {
        Some(href) => {
            let mut link = format!("<a{}", passthrough(el));
            push_attr(&mut link, "href", href);
            format!("{link}{}>{inner}</a>", target(el))
        }
        None => inner.to_owned(),
    };

    let mut expander = "";
    if el.has_class("expand") || el.has_class("expanded") {
        inner = format!("<center>{inner}</center>");
        expander = EXPANDER_TD;
    }

    format!(
        "<table class=\"{}\"><tbody><tr><td><table><tbody><tr><td>{inner}</td></tr></tbody></table></td>{expander}</tr></tbody></table>",
        class_list(&["button"], el),
    )
}

pub fn callout(el: &Element<'_>, inner: &str) -> String {
    format!(
        "<table{} class=\"callout\"><tbody><tr><th class=\"{}\">{inner}</th>{EXPANDER_TH}</tr></tbody></table>",
        passthrough(el),
        class_list(&["callout-inner"], el),
    )
}

pub fn spacer(el: &Element<'_>) -> String {
    let attrs = passthrough(el);
    let classes = class_list(&["spacer"], el);
    let table = |size: &str, extra: &str| {
        format!(
            "<table{attrs} class=\"{classes}{extra}\"><tbody><tr><td height=\"{size}\" style=\"font-size:{size}px;line-height:{size}px;\">&nbsp;</td></tr></tbody></table>"
        )
    };

    let small = el.attr("size-sm");
    let large = el.attr("size-lg");
    if small.is_none() && large.is_none() {
        return table(el.attr("size").unwrap_or("16"), "");
    }

    let mut out = String::new();
    if let Some(size) = small {
        out.push_str(&table(size, " hide-for-large"));
    }
    if let Some(size) = large {
        out.push_str(&table(size, " show-for-large"));
    }
    out
}

pub fn wrapper(el: &Element<'_>, inner: &str) -> String {
    format!(
        "<table{} class=\"{}\" align=\"center\"><tbody><tr><td class=\"wrapper-inner\">{inner}</td></tr></tbody></table>",
        passthrough(el),
        class_list(&["wrapper"], el),
    )
}

pub fn menu(el: &Element<'_>, inner: &str) -> String {
    format!(
        "<table{} class=\"{}\"><tbody><tr><td><table><tbody><tr>{inner}</tr></tbody></table></td></tr></tbody></table>",
        passthrough(el),
        class_list(&["menu"], el),
    )
}

pub fn menu_item(el: &Element<'_>, inner: &str) -> String {
    let mut link = String::from("<a");
    push_attr(&mut link, "href", el.attr("href").unwrap_or_default());
    format!(
        "<th{} class=\"{}\">{link}{}>{inner}</a></th>",
        passthrough(el),
        class_list(&["menu-item"], el),
        target(el),
    )
}

pub fn h_line(el: &Element<'_>) -> String {
    format!(
        "<table class=\"{}\"><tr><th>&nbsp;</th></tr></table>",
        class_list(&["h-line"], el),
    )
}

pub fn block_grid(el: &Element<'_>, inner: &str) -> String {
    let up = format!("up-{}", el.attr("up").unwrap_or_default());
    format!(
        "<table class=\"{}\"><tbody><tr>{inner}</tr></tbody></table>",
        class_list(&["block-grid", &up], el),
    )
}
