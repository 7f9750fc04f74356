//! Query object, predicate AST and the visitors that lower it to wire formats.

mod entity_query;
mod expr;
mod json_visitor;
mod odata_visitor;
mod operator;
mod predicate;
mod visitor;

pub use entity_query::{EntityQuery, OrderByClause};
pub use expr::{Expr, FunctionExpr, LiteralExpr, PropertyExpr};
pub use json_visitor::JsonVisitor;
pub use odata_visitor::{ODataFragment, ODataVisitor};
pub use operator::{
    BinaryOperator, BooleanOperator, QuantifierOperator, UnaryOperator, odata_operator,
};
pub use predicate::{AndOrPredicate, AnyAllPredicate, BinaryPredicate, Predicate, UnaryPredicate};
pub use visitor::{PredicateVisitor, VisitContext};
