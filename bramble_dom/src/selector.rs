// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small CSS selector engine.
//!
//! Supported syntax:
//! - selector lists (`a, b`)
//! - descendant (`a b`) and child (`a > b`) combinators
//! - type and universal selectors (`button`, `*`)
//! - `#id`, `.class`, `[attr]`, `[attr=value]`, `[attr="value"]`
//! - `:not(...)` over compound selectors, `:scope`, `:first-of-type`
//!
//! Matching runs right to left, the way browsers do it, so the cost of a
//! failed match is usually a single compound check.

use smallvec::SmallVec;

use crate::error::DomError;
use crate::tree::Tree;
use crate::types::NodeId;

/// A parsed selector list.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectorList {
    selectors: Vec<Complex>,
}

#[derive(Clone, Debug, PartialEq)]
struct Complex {
    /// Each compound paired with the combinator that links it to the one on its left.
    /// The first entry's combinator is unused.
    parts: Vec<(Combinator, Compound)>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Clone, Debug, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    simple: SmallVec<[Simple; 4]>,
}

#[derive(Clone, Debug, PartialEq)]
enum Simple {
    Id(String),
    Class(String),
    AttrExists(String),
    AttrEquals(String, String),
    Not(Vec<Compound>),
    Scope,
    FirstOfType,
}

impl SelectorList {
    /// Parse selector text.
    pub fn parse(input: &str) -> Result<Self, DomError> {
        let mut parser = Parser { src: input, pos: 0 };
        let selectors = parser.list().map_err(|reason| DomError::InvalidSelector {
            selector: input.to_owned(),
            reason,
        })?;
        parser.skip_ws();
        if parser.peek().is_some() {
            return Err(DomError::InvalidSelector {
                selector: input.to_owned(),
                reason: "unexpected trailing input",
            });
        }
        Ok(Self { selectors })
    }

    /// Whether `node` matches any selector in the list.
    ///
    /// `scope` is the element `:scope` refers to, if any.
    pub(crate) fn matches(&self, tree: &Tree, node: NodeId, scope: Option<NodeId>) -> bool {
        tree.is_element(node)
            && self
                .selectors
                .iter()
                .any(|c| match_complex(tree, &c.parts, node, scope))
    }
}

fn match_complex(
    tree: &Tree,
    parts: &[(Combinator, Compound)],
    node: NodeId,
    scope: Option<NodeId>,
) -> bool {
    let Some(((combinator, last), rest)) = parts.split_last() else {
        return false;
    };
    if !match_compound(tree, last, node, scope) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match combinator {
        Combinator::Child => tree
            .parent_of(node)
            .filter(|&p| tree.is_element(p))
            .is_some_and(|p| match_complex(tree, rest, p, scope)),
        Combinator::Descendant => {
            let mut cur = tree.parent_of(node);
            while let Some(p) = cur {
                if !tree.is_element(p) {
                    return false;
                }
                if match_complex(tree, rest, p, scope) {
                    return true;
                }
                cur = tree.parent_of(p);
            }
            false
        }
    }
}

fn match_compound(tree: &Tree, compound: &Compound, node: NodeId, scope: Option<NodeId>) -> bool {
    let Some(tag) = tree.tag(node) else {
        return false;
    };
    if let Some(want) = &compound.tag
        && want != tag
    {
        return false;
    }
    compound.simple.iter().all(|s| match s {
        Simple::Id(id) => tree.attribute(node, "id") == Some(id.as_str()),
        Simple::Class(class) => tree.has_class(node, class),
        Simple::AttrExists(name) => tree.attribute(node, name).is_some(),
        Simple::AttrEquals(name, value) => tree.attribute(node, name) == Some(value.as_str()),
        Simple::Not(inner) => !inner.iter().any(|c| match_compound(tree, c, node, scope)),
        Simple::Scope => scope == Some(node),
        Simple::FirstOfType => {
            let mut prev = tree.prev_element_sibling(node);
            while let Some(p) = prev {
                if tree.tag(p) == Some(tag) {
                    return false;
                }
                prev = tree.prev_element_sibling(p);
            }
            true
        }
    })
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

type ParseResult<T> = Result<T, &'static str>;

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Skip whitespace, reporting whether any was skipped.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos != start
    }

    fn ident(&mut self) -> ParseResult<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            self.bump();
        }
        if self.pos == start {
            return Err("expected an identifier");
        }
        Ok(self.src[start..self.pos].to_owned())
    }

    fn list(&mut self) -> ParseResult<Vec<Complex>> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            out.push(self.complex()?);
            self.skip_ws();
            if !self.eat(',') {
                return Ok(out);
            }
        }
    }

    fn complex(&mut self) -> ParseResult<Complex> {
        let mut parts = vec![(Combinator::Descendant, self.compound()?)];
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    Combinator::Child
                }
                None | Some(',') | Some(')') => return Ok(Complex { parts }),
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err("unexpected character"),
            };
            parts.push((combinator, self.compound()?));
        }
    }

    fn compound(&mut self) -> ParseResult<Compound> {
        let mut compound = Compound::default();
        let mut any = false;
        if self.eat('*') {
            any = true;
        } else if self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            compound.tag = Some(self.ident()?.to_ascii_lowercase());
            any = true;
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.simple.push(Simple::Id(self.ident()?));
                }
                Some('.') => {
                    self.bump();
                    compound.simple.push(Simple::Class(self.ident()?));
                }
                Some('[') => {
                    self.bump();
                    compound.simple.push(self.attribute()?);
                }
                Some(':') => {
                    self.bump();
                    compound.simple.push(self.pseudo()?);
                }
                _ => break,
            }
            any = true;
        }
        if any {
            Ok(compound)
        } else {
            Err("expected a selector")
        }
    }

    fn attribute(&mut self) -> ParseResult<Simple> {
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();
        if self.eat(']') {
            return Ok(Simple::AttrExists(name));
        }
        if !self.eat('=') {
            return Err("expected `=` or `]` in attribute selector");
        }
        self.skip_ws();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                loop {
                    match self.bump() {
                        Some(c) if c == q => break,
                        Some(_) => {}
                        None => return Err("unterminated string"),
                    }
                }
                self.src[start..self.pos - 1].to_owned()
            }
            _ => self.ident()?,
        };
        self.skip_ws();
        if !self.eat(']') {
            return Err("expected `]`");
        }
        Ok(Simple::AttrEquals(name, value))
    }

    fn pseudo(&mut self) -> ParseResult<Simple> {
        let name = self.ident()?;
        match name.as_str() {
            "scope" => Ok(Simple::Scope),
            "first-of-type" => Ok(Simple::FirstOfType),
            "not" => {
                if !self.eat('(') {
                    return Err("expected `(` after :not");
                }
                let mut inner = Vec::new();
                loop {
                    self.skip_ws();
                    inner.push(self.compound()?);
                    self.skip_ws();
                    if self.eat(')') {
                        return Ok(Simple::Not(inner));
                    }
                    if !self.eat(',') {
                        return Err("expected `,` or `)` in :not");
                    }
                }
            }
            _ => Err("unsupported pseudo-class"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    fn build() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        let list = tree.insert(NodeKind::Element("ul".into()));
        let first = tree.insert(NodeKind::Element("li".into()));
        let second = tree.insert(NodeKind::Element("li".into()));
        tree.insert_before(tree.body(), list, None).unwrap();
        tree.insert_before(list, first, None).unwrap();
        tree.insert_before(list, second, None).unwrap();
        tree.set_attribute(list, "id", "menu");
        tree.set_attribute(first, "class", "item active");
        tree.set_attribute(second, "class", "item");
        tree.set_attribute(second, "data-slot", "tail");
        (tree, list, first, second)
    }

    fn sel(s: &str) -> SelectorList {
        SelectorList::parse(s).unwrap()
    }

    #[test]
    fn compound_selectors_match() {
        let (tree, list, first, second) = build();
        assert!(sel("#menu").matches(&tree, list, None));
        assert!(sel("li.item.active").matches(&tree, first, None));
        assert!(!sel("li.item.active").matches(&tree, second, None));
        assert!(sel("[data-slot]").matches(&tree, second, None));
        assert!(sel("[data-slot=\"tail\"]").matches(&tree, second, None));
        assert!(sel("[data-slot=tail]").matches(&tree, second, None));
        assert!(sel("*").matches(&tree, second, None));
    }

    #[test]
    fn combinators_walk_ancestors() {
        let (tree, list, first, _) = build();
        assert!(sel("body li").matches(&tree, first, None));
        assert!(sel("ul > li").matches(&tree, first, None));
        assert!(!sel("body > li").matches(&tree, first, None));
        assert!(sel(":scope > li").matches(&tree, first, Some(list)));
        assert!(!sel(":scope > li").matches(&tree, first, None));
    }

    #[test]
    fn not_and_first_of_type() {
        let (tree, _, first, second) = build();
        assert!(sel("li:not(.active)").matches(&tree, second, None));
        assert!(!sel("li:not(.active)").matches(&tree, first, None));
        assert!(sel("li:first-of-type").matches(&tree, first, None));
        assert!(!sel("li:first-of-type").matches(&tree, second, None));
        assert!(sel("li:not([data-slot], .missing)").matches(&tree, first, None));
    }

    #[test]
    fn selector_lists_match_any() {
        let (tree, list, first, _) = build();
        let s = sel("ol, #menu , li.active");
        assert!(s.matches(&tree, list, None));
        assert!(s.matches(&tree, first, None));
    }

    #[test]
    fn invalid_selectors_are_errors() {
        for bad in ["", "li >", "[data", "a:hover", "li..x", ":not(li"] {
            assert!(
                SelectorList::parse(bad).is_err(),
                "{bad:?} should not parse"
            );
        }
    }
}
