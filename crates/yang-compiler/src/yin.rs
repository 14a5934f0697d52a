//! YIN (XML) syntax parser (RFC 7950 §14), producing the same [`Stmt`]
//! tree the canonical-syntax parser builds, so the schema compiler never
//! needs to know which source format a module came from.

use quick_xml::events::Event;
use quick_xml::Reader;

use yang_core::{Context, Symbol};
use yang_schema::{Span, Stmt, StmtKeyword};

use crate::diagnostics::Diagnostics;
use crate::parser::ParseError;

/// YIN keywords in the `urn:ietf:params:xml:ns:yang:yin:1` namespace map
/// 1:1 to statement keywords by element local name; a handful of
/// statements are represented as XML attributes instead of child elements
/// per RFC 7950 §14 (e.g. `<module name="...">`, `<type name="...">`).
fn attr_becomes_argument(local_name: &str) -> bool {
    matches!(
        local_name,
        "module"
            | "submodule"
            | "type"
            | "leaf"
            | "leaf-list"
            | "container"
            | "list"
            | "choice"
            | "case"
            | "grouping"
            | "typedef"
            | "uses"
            | "augment"
            | "identity"
            | "feature"
            | "extension"
            | "rpc"
            | "action"
            | "notification"
            | "anydata"
            | "anyxml"
            | "bit"
            | "enum"
            | "refine"
            | "if-feature"
            | "base"
            | "import"
            | "include"
    )
}

pub struct YinParser<'a> {
    ctx: &'a Context,
    diagnostics: Diagnostics,
}

impl<'a> YinParser<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            diagnostics: Diagnostics::new(),
        }
    }

    fn intern(&self, text: &str) -> Symbol {
        self.ctx.dict().insert(text)
    }

    pub fn parse(
        mut self,
        source: &str,
    ) -> Result<(yang_schema::ParsedModule, Diagnostics), ParseError> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Stmt> = Vec::new();
        let mut root: Option<Stmt> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) => {
                    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    let keyword = keyword_from_local_name(&self, &local);
                    let mut argument: Option<Symbol> = None;
                    for attr in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        let val = attr
                            .decode_and_unescape_value(reader.decoder())
                            .unwrap_or_default()
                            .into_owned();
                        if key == "name" || key == "value" {
                            argument = Some(self.intern(&val));
                        }
                    }
                    let stmt = Stmt::new(keyword, argument, Span::default());
                    if let Some(parent) = stack.last_mut() {
                        parent.substatements.push(stmt);
                    } else {
                        root = Some(stmt);
                    }
                }
                Ok(Event::Start(e)) => {
                    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    let keyword = keyword_from_local_name(&self, &local);

                    let mut argument: Option<Symbol> = None;
                    let mut value_attr: Option<Symbol> = None;
                    for attr in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        let val = attr
                            .decode_and_unescape_value(reader.decoder())
                            .unwrap_or_default()
                            .into_owned();
                        if key == "name" && attr_becomes_argument(&local) {
                            argument = Some(self.intern(&val));
                        } else if key == "value" {
                            value_attr = Some(self.intern(&val));
                        } else if argument.is_none() {
                            // Most non-`name` single-attribute statements
                            // (e.g. <value value="..">) carry their
                            // argument under a statement-specific
                            // attribute name; fall back to it.
                            argument = Some(self.intern(&val));
                        }
                    }
                    if argument.is_none() {
                        argument = value_attr;
                    }

                    let stmt = Stmt::new(keyword, argument, Span::default());
                    stack.push(stmt);
                }
                Ok(Event::Text(t)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = t.unescape().unwrap_or_default().into_owned();
                        if top.argument.is_none() && !text.trim().is_empty() {
                            top.argument = Some(self.intern(text.trim()));
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    if let Some(finished) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.substatements.push(finished);
                        } else {
                            root = Some(finished);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ParseError::Syntax(format!("YIN XML error: {e}")));
                }
                _ => {}
            }
            buf.clear();
        }

        let root = root.ok_or_else(|| ParseError::Syntax("empty YIN document".into()))?;
        Ok((yang_schema::ParsedModule { root }, self.diagnostics))
    }
}

fn keyword_from_local_name(parser: &YinParser<'_>, local: &str) -> StmtKeyword {
    crate::parser::keyword_from_text_pub(local).unwrap_or_else(|| {
        if let Some(colon) = local.find(':') {
            let (prefix, name) = (&local[..colon], &local[colon + 1..]);
            StmtKeyword::Extended(parser.intern(prefix), parser.intern(name))
        } else {
            StmtKeyword::Extended(parser.intern(""), parser.intern(local))
        }
    })
}
