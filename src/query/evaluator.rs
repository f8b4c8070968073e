use crate::error::{HcqrError, Result};
use crate::hcqr::Hcqr;
use crate::index::{HcqrIndex, QueryKind, QueryType, normalize_query};
use crate::query::parser::{Query, QueryNode, SetOperator};

/// Evaluates parsed queries against an [`HcqrIndex`]
pub struct QueryEvaluator<'a> {
    index: &'a dyn HcqrIndex,
    default_query_type: QueryType,
}

impl<'a> QueryEvaluator<'a> {
    pub fn new(index: &'a dyn HcqrIndex) -> Self {
        Self {
            index,
            default_query_type: QueryType::EXACT | QueryType::PREFIX,
        }
    }

    /// Completion type for text without explicit markers
    pub fn with_default_query_type(mut self, qt: QueryType) -> Self {
        self.default_query_type = qt;
        self
    }

    /// Evaluate a query into a single result tree
    pub fn evaluate(&self, query: &Query) -> Result<Hcqr> {
        match self.eval_node(&query.root)? {
            Some(result) => Ok(result),
            None => Ok(self.empty()),
        }
    }

    /// `None` stands for an absent operand, not an empty result
    fn eval_node(&self, node: &QueryNode) -> Result<Option<Hcqr>> {
        match node {
            QueryNode::Empty => Ok(None),
            QueryNode::Text { text, kind } => self.eval_text(text, *kind).map(Some),
            QueryNode::FullMatch(inner) => match self.eval_node(inner)? {
                Some(result) => result.all_to_full().map(Some),
                None => Ok(None),
            },
            QueryNode::Binary { op, left, right } => self.eval_binary(*op, left.as_deref(), right.as_deref()),
            QueryNode::Geometry { shape, .. } => Err(unsupported(&format!("geometry ({})", shape))),
            QueryNode::Region(_) => Err(unsupported("region")),
            QueryNode::Near(_) => Err(unsupported("proximity")),
            QueryNode::Compass { direction, .. } => Err(unsupported(&format!("compass ({})", direction))),
            QueryNode::Dilate { .. } => Err(unsupported("dilation")),
        }
    }

    fn eval_text(&self, raw: &str, kind: QueryKind) -> Result<Hcqr> {
        let (text, qt) = normalize_query(raw, self.default_query_type);
        if text.is_empty() {
            return Ok(self.empty());
        }
        log::debug!("evaluate {:?} '{}' as {}", kind, text, qt);
        self.index.query(kind, &text, qt)
    }

    fn eval_binary(
        &self,
        op: SetOperator,
        left: Option<&QueryNode>,
        right: Option<&QueryNode>,
    ) -> Result<Option<Hcqr>> {
        if op == SetOperator::Between {
            return Err(unsupported("between"));
        }

        // unsupported constructs fail even where the result would be empty
        let left = match left {
            Some(node) => self.eval_node(node)?,
            None => None,
        };
        let right = match right {
            Some(node) => self.eval_node(node)?,
            None => None,
        };

        let result = match (op, left, right) {
            (SetOperator::Union, None, None) => None,
            (SetOperator::Union, Some(side), None) | (SetOperator::Union, None, Some(side)) => Some(side),
            (SetOperator::Union, Some(a), Some(b)) => Some(a.union(&b)?),
            (SetOperator::Intersect, Some(a), Some(b)) => Some(a.intersect(&b)?),
            (SetOperator::Difference, Some(a), Some(b)) => Some(a.difference(&b)?),
            (SetOperator::Difference, Some(a), None) => Some(a),
            _ => Some(self.empty()),
        };
        Ok(result)
    }

    fn empty(&self) -> Hcqr {
        Hcqr::empty(self.index.context().clone())
    }
}

fn unsupported(feature: &str) -> HcqrError {
    HcqrError::UnsupportedFeature(feature.to_string())
}
