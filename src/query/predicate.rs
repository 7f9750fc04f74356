// ============================================================================
// Predicate AST
// ============================================================================
//
// A closed sum type: one variant per node kind. Wire formats are added by
// implementing `PredicateVisitor`, never by extending the tree.

use super::expr::{Expr, PropertyExpr};
use super::operator::{BinaryOperator, BooleanOperator, QuantifierOperator, UnaryOperator};
use super::visitor::{PredicateVisitor, VisitContext};
use crate::core::{BreezeError, Result, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryPredicate {
    pub op: BinaryOperator,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryPredicate {
    pub op: UnaryOperator,
    pub predicate: Box<Predicate>,
}

/// Conjunction or disjunction. Always holds at least two children.
#[derive(Debug, Clone, PartialEq)]
pub struct AndOrPredicate {
    pub op: BooleanOperator,
    pub predicates: Vec<Predicate>,
}

/// Quantifier over a collection-valued navigation property.
#[derive(Debug, Clone, PartialEq)]
pub struct AnyAllPredicate {
    pub op: QuantifierOperator,
    pub collection: PropertyExpr,
    pub predicate: Box<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Binary(BinaryPredicate),
    Unary(UnaryPredicate),
    AndOr(AndOrPredicate),
    AnyAll(AnyAllPredicate),
    /// Pre-built wire fragment emitted verbatim
    Passthrough(String),
}

impl Predicate {
    /// Builds a binary predicate from a left-hand expression, an operator
    /// name or symbol, and a literal right-hand value.
    ///
    /// ```
    /// use rustbreeze::query::Predicate;
    ///
    /// let p = Predicate::create("Freight", ">", 100).unwrap();
    /// assert_eq!(p.to_odata().unwrap(), "Freight gt 100");
    /// ```
    pub fn create(lhs: &str, op: &str, value: impl Into<Value>) -> Result<Self> {
        let op = BinaryOperator::parse(op)?;
        let value = value.into();
        match (&op, &value) {
            (BinaryOperator::In, Value::List(items)) if items.is_empty() => {
                return Err(BreezeError::InvalidPredicate(format!(
                    "'in' on '{}' needs at least one value",
                    lhs
                )));
            }
            (BinaryOperator::In, Value::List(_)) => {}
            (BinaryOperator::In, _) => {
                return Err(BreezeError::InvalidPredicate(format!(
                    "'in' on '{}' needs a list of values",
                    lhs
                )));
            }
            (_, Value::List(_)) => {
                return Err(BreezeError::InvalidPredicate(format!(
                    "'{}' cannot compare '{}' against a list",
                    op, lhs
                )));
            }
            _ => {}
        }
        Ok(Self::binary(Expr::parse(lhs)?, op, Expr::literal(value)))
    }

    /// Like [`Predicate::create`] but with an arbitrary right-hand expression,
    /// e.g. another property.
    pub fn compare(lhs: &str, op: &str, rhs: Expr) -> Result<Self> {
        let op = BinaryOperator::parse(op)?;
        if op == BinaryOperator::In {
            return Err(BreezeError::InvalidPredicate(
                "'in' takes a list of literal values".to_string(),
            ));
        }
        Ok(Self::binary(Expr::parse(lhs)?, op, rhs))
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Self::Binary(BinaryPredicate { op, left, right })
    }

    pub fn and(predicates: Vec<Predicate>) -> Result<Self> {
        Self::and_or(BooleanOperator::And, predicates)
    }

    pub fn or(predicates: Vec<Predicate>) -> Result<Self> {
        Self::and_or(BooleanOperator::Or, predicates)
    }

    /// Zero children is a construction error; a single child stands alone.
    pub fn and_or(op: BooleanOperator, mut predicates: Vec<Predicate>) -> Result<Self> {
        match predicates.len() {
            0 => Err(BreezeError::InvalidPredicate(format!(
                "'{}' needs at least one predicate",
                op.key()
            ))),
            1 => Ok(predicates.remove(0)),
            _ => Ok(Self::AndOr(AndOrPredicate { op, predicates })),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self {
        Self::Unary(UnaryPredicate {
            op: UnaryOperator::Not,
            predicate: Box::new(predicate),
        })
    }

    pub fn any(collection: &str, predicate: Predicate) -> Self {
        Self::quantified(QuantifierOperator::Any, collection, predicate)
    }

    pub fn all(collection: &str, predicate: Predicate) -> Self {
        Self::quantified(QuantifierOperator::All, collection, predicate)
    }

    pub fn quantified(op: QuantifierOperator, collection: &str, predicate: Predicate) -> Self {
        Self::AnyAll(AnyAllPredicate {
            op,
            collection: PropertyExpr {
                path: collection.to_string(),
            },
            predicate: Box::new(predicate),
        })
    }

    pub fn passthrough(raw: impl Into<String>) -> Self {
        Self::Passthrough(raw.into())
    }

    /// `self and other`, flattening into an existing conjunction.
    pub fn and_also(self, other: Predicate) -> Self {
        self.combine(BooleanOperator::And, other)
    }

    pub fn or_else(self, other: Predicate) -> Self {
        self.combine(BooleanOperator::Or, other)
    }

    pub fn negate(self) -> Self {
        match self {
            Self::Unary(UnaryPredicate { predicate, .. }) => *predicate,
            other => Self::not(other),
        }
    }

    fn combine(self, op: BooleanOperator, other: Predicate) -> Self {
        match self {
            Self::AndOr(mut group) if group.op == op => {
                group.predicates.push(other);
                Self::AndOr(group)
            }
            first => Self::AndOr(AndOrPredicate {
                op,
                predicates: vec![first, other],
            }),
        }
    }

    /// Double dispatch into the visitor method for this node kind.
    pub fn visit<V: PredicateVisitor + ?Sized>(
        &self,
        ctx: &VisitContext<'_>,
        visitor: &V,
    ) -> Result<V::Output> {
        match self {
            Self::Binary(p) => visitor.visit_binary(p, ctx),
            Self::Unary(p) => visitor.visit_unary(p, ctx),
            Self::AndOr(p) => visitor.visit_and_or(p, ctx),
            Self::AnyAll(p) => visitor.visit_any_all(p, ctx),
            Self::Passthrough(raw) => visitor.visit_passthrough(raw, ctx),
        }
    }

    /// Formats against an untyped context with no naming convention.
    pub fn to_odata(&self) -> Result<String> {
        let metadata = crate::metadata::MetadataStore::new();
        let ctx = VisitContext::anonymous(&metadata);
        self.visit(&ctx, &super::ODataVisitor)
    }
}

impl Expr {
    pub fn visit<V: PredicateVisitor + ?Sized>(
        &self,
        ctx: &VisitContext<'_>,
        visitor: &V,
    ) -> Result<V::ExprOutput> {
        match self {
            Self::Literal(lit) => visitor.visit_literal(lit, ctx),
            Self::Property(prop) => visitor.visit_property(prop, ctx),
            Self::Function(func) => visitor.visit_function(func, ctx),
        }
    }
}
