//! Built-in block helpers registered on every template registry.
//!
//! | Helper                         | Renders the block when                 |
//! |--------------------------------|----------------------------------------|
//! | `{{#ifequal a b}}`             | `a == b`                               |
//! | `{{#ifpage "a" "b"}}`          | the current page is one of the names   |
//! | `{{#unlesspage "a" "b"}}`      | the current page is none of the names  |
//! | `{{#repeat n}}`                | always, `n` times                      |
//!
//! All but `repeat` render their `{{else}}` branch otherwise.

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
    RenderErrorReason, Renderable,
};
use serde_json::Value;

/// Register every built-in helper on `registry`.
pub fn register_builtin(registry: &mut Handlebars<'static>) {
    registry.register_helper("ifequal", Box::new(IfEqual));
    registry.register_helper("ifpage", Box::new(IfPage { negate: false }));
    registry.register_helper("unlesspage", Box::new(IfPage { negate: true }));
    registry.register_helper("repeat", Box::new(Repeat));
}

/// Render the main block when `cond` holds, the inverse block otherwise.
fn render_branch<'reg: 'rc, 'rc>(
    cond: bool,
    h: &Helper<'rc>,
    r: &'reg Handlebars<'reg>,
    ctx: &'rc Context,
    rc: &mut RenderContext<'reg, 'rc>,
    out: &mut dyn Output,
) -> HelperResult {
    let template = if cond { h.template() } else { h.inverse() };
    match template {
        Some(t) => t.render(r, ctx, rc, out),
        None => Ok(()),
    }
}

struct IfEqual;

impl HelperDef for IfEqual {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let left = h
            .param(0)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("ifequal", 0))?;
        let right = h
            .param(1)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("ifequal", 1))?;
        render_branch(left.value() == right.value(), h, r, ctx, rc, out)
    }
}

struct IfPage {
    negate: bool,
}

impl HelperDef for IfPage {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let current = ctx.data().get("page").and_then(Value::as_str);
        let matched = current.is_some_and(|page| {
            h.params()
                .iter()
                .any(|p| p.value().as_str() == Some(page))
        });
        render_branch(matched != self.negate, h, r, ctx, rc, out)
    }
}

struct Repeat;

impl HelperDef for Repeat {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let count = h
            .param(0)
            .and_then(|p| p.value().as_u64())
            .ok_or(RenderErrorReason::InvalidParamType("non-negative integer"))?;

        if let Some(t) = h.template() {
            for _ in 0..count {
                t.render(r, ctx, rc, out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Handlebars<'static> {
        let mut registry = Handlebars::new();
        register_builtin(&mut registry);
        registry
    }

    #[test]
    fn test_ifequal() {
        let r = registry();
        let tpl = "{{#ifequal kind \"promo\"}}yes{{else}}no{{/ifequal}}";
        assert_eq!(r.render_template(tpl, &json!({"kind": "promo"})).unwrap(), "yes");
        assert_eq!(r.render_template(tpl, &json!({"kind": "receipt"})).unwrap(), "no");
    }

    #[test]
    fn test_ifequal_missing_param() {
        let r = registry();
        assert!(r.render_template("{{#ifequal a}}x{{/ifequal}}", &json!({})).is_err());
    }

    #[test]
    fn test_ifpage() {
        let r = registry();
        let tpl = "{{#ifpage \"welcome\" \"signup\"}}hit{{else}}miss{{/ifpage}}";
        assert_eq!(r.render_template(tpl, &json!({"page": "signup"})).unwrap(), "hit");
        assert_eq!(r.render_template(tpl, &json!({"page": "receipt"})).unwrap(), "miss");
        assert_eq!(r.render_template(tpl, &json!({})).unwrap(), "miss");
    }

    #[test]
    fn test_ifpage_inside_blocks_and_partials() {
        let mut r = registry();
        r.register_partial("badge", "{{#ifpage \"welcome\"}}p{{/ifpage}}")
            .unwrap();
        let data = json!({"page": "welcome", "items": [1, 2], "obj": {"a": 1}});

        let each = "{{#each items}}{{#ifpage \"welcome\"}}x{{/ifpage}}{{/each}}";
        assert_eq!(r.render_template(each, &data).unwrap(), "xx");

        let with = "{{#with obj}}{{a}}{{#unlesspage \"welcome\"}}no{{else}}yes{{/unlesspage}}{{/with}}";
        assert_eq!(r.render_template(with, &data).unwrap(), "1yes");

        let partial = "{{#each items}}{{> badge}}{{/each}}";
        assert_eq!(r.render_template(partial, &data).unwrap(), "pp");
    }

    #[test]
    fn test_unlesspage() {
        let r = registry();
        let tpl = "{{#unlesspage \"welcome\"}}footer{{/unlesspage}}";
        assert_eq!(r.render_template(tpl, &json!({"page": "welcome"})).unwrap(), "");
        assert_eq!(r.render_template(tpl, &json!({"page": "receipt"})).unwrap(), "footer");
    }

    #[test]
    fn test_repeat() {
        let r = registry();
        let tpl = "{{#repeat 3}}<td></td>{{/repeat}}";
        assert_eq!(r.render_template(tpl, &json!({})).unwrap(), "<td></td><td></td><td></td>");
        assert_eq!(r.render_template("{{#repeat 0}}x{{/repeat}}", &json!({})).unwrap(), "");
    }

    #[test]
    fn test_repeat_requires_number() {
        let r = registry();
        assert!(r.render_template("{{#repeat \"two\"}}x{{/repeat}}", &json!({})).is_err());
    }
}
