//! OData `$filter` formatting.
//!
//! Property paths resolve to server names joined with `/`. Inside a
//! quantifier body the lambda variable (`x1`, `x2`, ...) is prepended so
//! nested `any`/`all` scopes never share a binding.

use super::expr::{FunctionExpr, LiteralExpr, PropertyExpr};
use super::operator::{BinaryOperator, odata_operator};
use super::predicate::{AndOrPredicate, AnyAllPredicate, BinaryPredicate, UnaryPredicate};
use super::visitor::{PredicateVisitor, VisitContext};
use crate::core::{BreezeError, DataType, Result, Value};

/// A formatted operand: one literal, or one per element for list values.
#[derive(Debug, Clone, PartialEq)]
pub enum ODataFragment {
    One(String),
    Many(Vec<String>),
}

impl ODataFragment {
    pub fn single(self) -> Result<String> {
        match self {
            Self::One(s) => Ok(s),
            Self::Many(_) => Err(BreezeError::InvalidPredicate(
                "A list of values is only valid on the right of 'in'".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ODataVisitor;

impl ODataVisitor {
    fn prefixed(ctx: &VisitContext<'_>, path: String) -> String {
        match &ctx.prefix {
            Some(prefix) => format!("{}/{}", prefix, path),
            None => path,
        }
    }
}

impl PredicateVisitor for ODataVisitor {
    type ExprOutput = ODataFragment;
    type Output = String;

    fn visit_literal(&self, lit: &LiteralExpr, ctx: &VisitContext<'_>) -> Result<ODataFragment> {
        let data_type = lit
            .data_type
            .or(ctx.literal_type)
            .unwrap_or(DataType::Undefined);
        match &lit.value {
            Value::List(items) => items
                .iter()
                .map(|item| data_type.fmt_odata(item))
                .collect::<Result<Vec<_>>>()
                .map(ODataFragment::Many),
            value => data_type.fmt_odata(value).map(ODataFragment::One),
        }
    }

    fn visit_property(&self, prop: &PropertyExpr, ctx: &VisitContext<'_>) -> Result<ODataFragment> {
        let path = ctx
            .metadata
            .client_path_to_server(&ctx.entity_type, &prop.path, "/")?;
        Ok(ODataFragment::One(Self::prefixed(ctx, path)))
    }

    fn visit_function(&self, func: &FunctionExpr, ctx: &VisitContext<'_>) -> Result<ODataFragment> {
        let arg_ctx = ctx.with_literal_type(None);
        let args = func
            .args
            .iter()
            .map(|arg| arg.visit(&arg_ctx, self)?.single())
            .collect::<Result<Vec<_>>>()?;
        Ok(ODataFragment::One(format!("{}({})", func.name, args.join(","))))
    }

    fn visit_binary(&self, pred: &BinaryPredicate, ctx: &VisitContext<'_>) -> Result<String> {
        let left_type = ctx.expr_type(&pred.left);
        let left = pred.left.visit(&ctx.with_literal_type(None), self)?.single()?;
        let right = pred.right.visit(&ctx.with_literal_type(left_type), self)?;

        if pred.op == BinaryOperator::In {
            let values = match right {
                ODataFragment::Many(values) => values,
                ODataFragment::One(value) => vec![value],
            };
            let clauses: Vec<String> = values
                .iter()
                .map(|v| format!("({} eq {})", left, v))
                .collect();
            return Ok(clauses.join(" or "));
        }

        let right = right.single()?;
        let op = odata_operator(pred.op.key());
        if !pred.op.is_function() {
            return Ok(format!("{} {} {}", left, op, right));
        }
        if op == "substringof" {
            // substringof(needle, haystack)
            Ok(format!("{}({},{}) eq true", op, right, left))
        } else {
            Ok(format!("{}({},{}) eq true", op, left, right))
        }
    }

    fn visit_unary(&self, pred: &UnaryPredicate, ctx: &VisitContext<'_>) -> Result<String> {
        let inner = pred.predicate.visit(ctx, self)?;
        Ok(format!("{} ({})", odata_operator(pred.op.key()), inner))
    }

    fn visit_and_or(&self, pred: &AndOrPredicate, ctx: &VisitContext<'_>) -> Result<String> {
        if pred.predicates.is_empty() {
            return Err(BreezeError::InvalidPredicate(format!(
                "'{}' with no predicates",
                pred.op.key()
            )));
        }
        let parts = pred
            .predicates
            .iter()
            .map(|p| p.visit(ctx, self).map(|s| format!("({})", s)))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(&format!(" {} ", odata_operator(pred.op.key()))))
    }

    fn visit_any_all(&self, pred: &AnyAllPredicate, ctx: &VisitContext<'_>) -> Result<String> {
        let resolved = ctx
            .metadata
            .resolve_path(&ctx.entity_type, &pred.collection.path)?;
        if !ctx.entity_type.is_anonymous() && !resolved.is_collection {
            return Err(BreezeError::InvalidPredicate(format!(
                "'{}' is not a collection navigation property of '{}'",
                pred.collection.path,
                ctx.entity_type.name()
            )));
        }

        let collection = Self::prefixed(ctx, resolved.join("/"));
        let (token, inner_ctx) = ctx.nested(resolved.target);
        let inner = pred.predicate.visit(&inner_ctx, self)?;
        Ok(format!(
            "{}/{}({}: {})",
            collection,
            odata_operator(pred.op.key()),
            token,
            inner
        ))
    }

    fn visit_passthrough(&self, raw: &str, _ctx: &VisitContext<'_>) -> Result<String> {
        Ok(raw.to_string())
    }
}
