//! Template-token rewriting for the HTML::Template runtime.
//!
//! Authors write lowercase pseudo-tags (`<tmpl_var name>`) so that the markup
//! survives HTML tooling. The runtime wants uppercase tags, and `TMPL_VAR` /
//! `TMPL_INCLUDE` take no closing tag.
//!
//! Rules run in order, each on the output of the previous one:
//!
//! | find              | replace         |
//! |-------------------|-----------------|
//! | `</tmpl_var>`     | removed         |
//! | `tmpl_var`        | `TMPL_VAR`      |
//! | `</tmpl_include>` | removed         |
//! | `tmpl_include`    | `TMPL_INCLUDE`  |
//! | `tmpl_loop`       | `TMPL_LOOP`     |
//! | `tmpl_if`         | `TMPL_IF`       |
//!
//! Loop and conditional closing tags (`</tmpl_loop>`, `</tmpl_if>`) are left
//! as written: tag names are case-insensitive for the runtime.

/// One substitution step.
#[derive(Debug, Clone, Copy)]
struct Rule {
    find: &'static str,
    replace: &'static str,
    /// Leave occurrences that are the name of a closing tag.
    skip_closing: bool,
}

const RULES: &[Rule] = &[
    Rule { find: "</tmpl_var>", replace: "", skip_closing: false },
    Rule { find: "tmpl_var", replace: "TMPL_VAR", skip_closing: false },
    Rule { find: "</tmpl_include>", replace: "", skip_closing: false },
    Rule { find: "tmpl_include", replace: "TMPL_INCLUDE", skip_closing: false },
    Rule { find: "tmpl_loop", replace: "TMPL_LOOP", skip_closing: true },
    Rule { find: "tmpl_if", replace: "TMPL_IF", skip_closing: true },
];

/// Apply every rule to `html`.
pub fn rewrite_tokens(html: &str) -> String {
    RULES.iter().fold(html.to_owned(), |text, rule| rule.apply(&text))
}

impl Rule {
    fn apply(&self, text: &str) -> String {
        if !self.skip_closing {
            return text.replace(self.find, self.replace);
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (pos, _) in text.match_indices(self.find) {
            out.push_str(&text[last..pos]);
            if text[..pos].ends_with("</") {
                out.push_str(self.find);
            } else {
                out.push_str(self.replace);
            }
            last = pos + self.find.len();
        }
        out.push_str(&text[last..]);
        out
    }
}
