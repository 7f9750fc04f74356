use super::expr::{FunctionExpr, LiteralExpr, PropertyExpr};
use super::predicate::{AndOrPredicate, AnyAllPredicate, BinaryPredicate, UnaryPredicate};
use crate::core::{DataType, Result};
use crate::metadata::{MetadataStore, ResolvedType};

/// State threaded through a visit.
#[derive(Debug, Clone)]
pub struct VisitContext<'a> {
    pub metadata: &'a MetadataStore,
    /// Type that property paths are resolved against
    pub entity_type: ResolvedType,
    /// Lambda variable of the enclosing quantifier, if any
    pub prefix: Option<String>,
    /// Quantifier nesting depth; the next token is `x{depth + 1}`
    pub depth: usize,
    /// Type an untyped literal should adopt (set from the other operand)
    pub literal_type: Option<DataType>,
}

impl<'a> VisitContext<'a> {
    pub fn new(metadata: &'a MetadataStore, entity_type: ResolvedType) -> Self {
        Self {
            metadata,
            entity_type,
            prefix: None,
            depth: 0,
            literal_type: None,
        }
    }

    pub fn anonymous(metadata: &'a MetadataStore) -> Self {
        Self::new(metadata, ResolvedType::Anonymous)
    }

    pub fn with_literal_type(&self, literal_type: Option<DataType>) -> Self {
        Self {
            literal_type,
            ..self.clone()
        }
    }

    /// Derives the scope of a quantifier body: the element type becomes the
    /// resolution type and a fresh token becomes the prefix.
    pub fn nested(&self, element_type: ResolvedType) -> (String, Self) {
        let depth = self.depth + 1;
        let token = format!("x{}", depth);
        let ctx = Self {
            metadata: self.metadata,
            entity_type: element_type,
            prefix: Some(token.clone()),
            depth,
            literal_type: None,
        };
        (token, ctx)
    }

    /// Data type of an expression when it can be known without formatting it.
    pub fn expr_type(&self, expr: &super::Expr) -> Option<DataType> {
        match expr {
            super::Expr::Literal(lit) => lit.data_type,
            super::Expr::Property(prop) => self
                .metadata
                .resolve_path(&self.entity_type, &prop.path)
                .ok()
                .and_then(|resolved| resolved.data_type),
            super::Expr::Function(func) => func.return_type(),
        }
    }
}

/// One method per AST node kind. Implement this to add a wire format.
pub trait PredicateVisitor {
    /// Result of visiting an expression operand
    type ExprOutput;
    /// Result of visiting a predicate
    type Output;

    fn visit_literal(&self, lit: &LiteralExpr, ctx: &VisitContext<'_>) -> Result<Self::ExprOutput>;
    fn visit_property(&self, prop: &PropertyExpr, ctx: &VisitContext<'_>)
    -> Result<Self::ExprOutput>;
    fn visit_function(&self, func: &FunctionExpr, ctx: &VisitContext<'_>)
    -> Result<Self::ExprOutput>;

    fn visit_binary(&self, pred: &BinaryPredicate, ctx: &VisitContext<'_>) -> Result<Self::Output>;
    fn visit_unary(&self, pred: &UnaryPredicate, ctx: &VisitContext<'_>) -> Result<Self::Output>;
    fn visit_and_or(&self, pred: &AndOrPredicate, ctx: &VisitContext<'_>) -> Result<Self::Output>;
    fn visit_any_all(&self, pred: &AnyAllPredicate, ctx: &VisitContext<'_>)
    -> Result<Self::Output>;
    fn visit_passthrough(&self, raw: &str, ctx: &VisitContext<'_>) -> Result<Self::Output>;
}
