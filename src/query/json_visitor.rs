//! JSON `where` clause formatting.
//!
//! Produces the structural form carried by the JSON query document:
//! `{"Freight":{"gt":100}}`, `{"and":[...]}`, `{"Orders":{"any":{...}}}`.
//! Paths are server names joined with `.`; quantifier bodies are relative to
//! the element type so no lambda variables appear.

use serde_json::{Map, Value as JsonValue, json};

use super::expr::{Expr, FunctionExpr, LiteralExpr, PropertyExpr};
use super::operator::BinaryOperator;
use super::predicate::{AndOrPredicate, AnyAllPredicate, BinaryPredicate, UnaryPredicate};
use super::visitor::{PredicateVisitor, VisitContext};
use crate::core::{BreezeError, DataType, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonVisitor;

impl JsonVisitor {
    /// Textual form of an operand, used for function arguments and keys.
    fn expr_text(&self, expr: &Expr, ctx: &VisitContext<'_>) -> Result<String> {
        match expr {
            Expr::Literal(lit) => lit
                .data_type
                .unwrap_or(DataType::Undefined)
                .fmt_odata(&lit.value),
            Expr::Property(prop) => ctx
                .metadata
                .client_path_to_server(&ctx.entity_type, &prop.path, "."),
            Expr::Function(func) => {
                let args = func
                    .args
                    .iter()
                    .map(|arg| self.expr_text(arg, ctx))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{}({})", func.name, args.join(",")))
            }
        }
    }
}

impl PredicateVisitor for JsonVisitor {
    type ExprOutput = JsonValue;
    type Output = JsonValue;

    fn visit_literal(&self, lit: &LiteralExpr, ctx: &VisitContext<'_>) -> Result<JsonValue> {
        let data_type = lit
            .data_type
            .or(ctx.literal_type)
            .unwrap_or(DataType::Undefined);
        let value = match data_type {
            DataType::Undefined => lit.value.clone(),
            dt => match &lit.value {
                crate::core::Value::List(items) => crate::core::Value::List(
                    items
                        .iter()
                        .map(|item| dt.validate_value(item.clone()))
                        .collect::<Result<Vec<_>>>()?,
                ),
                value => dt.validate_value(value.clone())?,
            },
        };
        Ok(data_type.fmt_json(&value))
    }

    fn visit_property(&self, prop: &PropertyExpr, ctx: &VisitContext<'_>) -> Result<JsonValue> {
        let path = ctx
            .metadata
            .client_path_to_server(&ctx.entity_type, &prop.path, ".")?;
        Ok(JsonValue::String(path))
    }

    fn visit_function(&self, func: &FunctionExpr, ctx: &VisitContext<'_>) -> Result<JsonValue> {
        let text = self.expr_text(&Expr::Function(func.clone()), ctx)?;
        Ok(JsonValue::String(text))
    }

    fn visit_binary(&self, pred: &BinaryPredicate, ctx: &VisitContext<'_>) -> Result<JsonValue> {
        let left = self.expr_text(&pred.left, ctx)?;
        let right = match &pred.right {
            Expr::Property(_) => json!({
                "value": pred.right.visit(ctx, self)?,
                "isProperty": true,
            }),
            other => other.visit(&ctx.with_literal_type(ctx.expr_type(&pred.left)), self)?,
        };

        let mut clause = Map::new();
        if pred.op == BinaryOperator::Equals {
            clause.insert(left, right);
        } else {
            clause.insert(left, json!({ pred.op.key(): right }));
        }
        Ok(JsonValue::Object(clause))
    }

    fn visit_unary(&self, pred: &UnaryPredicate, ctx: &VisitContext<'_>) -> Result<JsonValue> {
        let inner = pred.predicate.visit(ctx, self)?;
        Ok(json!({ pred.op.key(): inner }))
    }

    fn visit_and_or(&self, pred: &AndOrPredicate, ctx: &VisitContext<'_>) -> Result<JsonValue> {
        if pred.predicates.is_empty() {
            return Err(BreezeError::InvalidPredicate(format!(
                "'{}' with no predicates",
                pred.op.key()
            )));
        }
        let parts = pred
            .predicates
            .iter()
            .map(|p| p.visit(ctx, self))
            .collect::<Result<Vec<_>>>()?;
        Ok(json!({ pred.op.key(): parts }))
    }

    fn visit_any_all(&self, pred: &AnyAllPredicate, ctx: &VisitContext<'_>) -> Result<JsonValue> {
        let resolved = ctx
            .metadata
            .resolve_path(&ctx.entity_type, &pred.collection.path)?;
        let (_, inner_ctx) = ctx.nested(resolved.target.clone());
        let inner = pred.predicate.visit(&inner_ctx, self)?;

        let mut clause = Map::new();
        clause.insert(resolved.join("."), json!({ pred.op.key(): inner }));
        Ok(JsonValue::Object(clause))
    }

    fn visit_passthrough(&self, raw: &str, _ctx: &VisitContext<'_>) -> Result<JsonValue> {
        Ok(serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string())))
    }
}
