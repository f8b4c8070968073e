use crate::index::QueryKind;

/// Parsed query representation
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub root: QueryNode,
}

impl Query {
    /// Check if the query has nothing to evaluate
    pub fn is_empty(&self) -> bool {
        matches!(self.root, QueryNode::Empty)
    }
}

/// Binary set operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    /// `+`
    Union,
    /// `/` or juxtaposition
    Intersect,
    /// `-`
    Difference,
    /// `<->`, the area between two results
    Between,
}

/// Query AST node
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// Text lookup. `text` keeps its completion markers (`"..."`, `*`).
    Text { text: String, kind: QueryKind },
    /// `%expr`: every leaf of the result becomes a full match
    FullMatch(Box<QueryNode>),
    /// Binary set operation; a missing operand is `None`
    Binary {
        op: SetOperator,
        left: Option<Box<QueryNode>>,
        right: Option<Box<QueryNode>>,
    },
    /// `rect:`, `poly:`, `path:` or `point:` with its raw coordinates
    Geometry { shape: String, value: String },
    /// `region:<id>`
    Region(String),
    /// `near:<text>`
    Near(String),
    /// `north:expr` and friends
    Compass { direction: String, inner: Box<QueryNode> },
    /// `dilate:<distance> expr`
    Dilate { distance: String, inner: Box<QueryNode> },
    /// Empty query
    Empty,
}

/// Parse a query string into a Query structure
pub fn parse_query(input: &str) -> Query {
    let mut parser = QueryParser::new(input);
    parser.parse()
}

/// Query parser
struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> QueryParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(&mut self) -> Query {
        let mut root = self.parse_expr();

        // stray closing parens end the expression early; keep going
        self.skip_whitespace();
        while self.consume_char(')') {
            let rest = self.parse_expr();
            root = join(SetOperator::Intersect, root, rest);
            self.skip_whitespace();
        }

        Query { root }
    }

    /// Left-associative chain of binary operators, all of equal precedence
    fn parse_expr(&mut self) -> QueryNode {
        let mut left = self.parse_operand();

        loop {
            self.skip_whitespace();
            if self.is_eof() || self.peek_char() == Some(')') {
                break;
            }

            let op = self.parse_operator().unwrap_or(SetOperator::Intersect);
            let right = self.parse_operand();
            left = QueryNode::Binary {
                op,
                left: boxed(left),
                right: boxed(right),
            };
        }

        left
    }

    fn parse_operator(&mut self) -> Option<SetOperator> {
        if self.remaining().starts_with("<->") {
            self.pos += 3;
            return Some(SetOperator::Between);
        }
        match self.peek_char()? {
            '+' => {
                self.advance();
                Some(SetOperator::Union)
            }
            '/' => {
                self.advance();
                Some(SetOperator::Intersect)
            }
            '-' => {
                self.advance();
                Some(SetOperator::Difference)
            }
            _ => None,
        }
    }

    /// An operand, or `Empty` when an operator or the end follows
    fn parse_operand(&mut self) -> QueryNode {
        self.skip_whitespace();

        if self.is_eof() || self.at_operator() || self.peek_char() == Some(')') {
            return QueryNode::Empty;
        }

        self.parse_unary()
    }

    fn parse_unary(&mut self) -> QueryNode {
        self.skip_whitespace();

        if self.consume_char('%') {
            return match self.parse_unary() {
                QueryNode::Empty => QueryNode::Empty,
                inner => QueryNode::FullMatch(Box::new(inner)),
            };
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> QueryNode {
        self.skip_whitespace();

        // Parenthesized expression
        if self.consume_char('(') {
            let node = self.parse_expr();
            self.consume_char(')');
            return node;
        }

        // Quoted phrase
        if self.peek_char() == Some('"') {
            return self.parse_phrase(QueryKind::Mixed);
        }

        self.parse_term()
    }

    fn parse_phrase(&mut self, kind: QueryKind) -> QueryNode {
        let start = self.pos;
        self.consume_char('"');

        while !self.is_eof() && self.peek_char() != Some('"') {
            self.advance();
        }
        self.consume_char('"');

        let text = &self.input[start..self.pos];
        if text.trim_matches('"').trim().is_empty() {
            return QueryNode::Empty;
        }
        QueryNode::Text {
            text: text.to_string(),
            kind,
        }
    }

    fn parse_term(&mut self) -> QueryNode {
        let start = self.pos;

        // Check for field prefix
        while !self.is_eof() {
            let ch = self.peek_char().unwrap_or(' ');
            if ch.is_alphanumeric() || ch == '_' || ch == ':' {
                self.advance();
                if ch == ':' {
                    let field = self.input[start..self.pos - 1].to_lowercase();
                    if let Some(node) = self.parse_field(&field) {
                        return node;
                    }
                    break;
                }
            } else {
                break;
            }
        }

        self.read_word();
        let word = &self.input[start..self.pos];
        if word.is_empty() {
            // not a term start; skip it so the parser always advances
            if !self.at_operator() && self.peek_char() != Some(')') {
                self.advance();
            }
            return QueryNode::Empty;
        }
        QueryNode::Text {
            text: word.to_string(),
            kind: QueryKind::Mixed,
        }
    }

    /// Field syntax, or `None` when `field` is no known prefix and the
    /// whole thing is a plain word
    fn parse_field(&mut self, field: &str) -> Option<QueryNode> {
        let node = match field {
            "items" | "regions" => {
                let kind = if field == "items" {
                    QueryKind::Items
                } else {
                    QueryKind::Regions
                };
                if self.peek_char() == Some('"') {
                    return Some(self.parse_phrase(kind));
                }
                let value = self.read_value();
                if value.is_empty() {
                    QueryNode::Empty
                } else {
                    QueryNode::Text { text: value, kind }
                }
            }
            "rect" | "poly" | "path" | "point" => QueryNode::Geometry {
                shape: field.to_string(),
                value: self.read_value(),
            },
            "region" => QueryNode::Region(self.read_value()),
            "near" => {
                if self.peek_char() == Some('"') {
                    let start = self.pos;
                    self.parse_phrase(QueryKind::Mixed);
                    QueryNode::Near(self.input[start..self.pos].to_string())
                } else {
                    QueryNode::Near(self.read_value())
                }
            }
            "north" | "south" | "east" | "west" => QueryNode::Compass {
                direction: field.to_string(),
                inner: Box::new(self.parse_unary()),
            },
            "dilate" => {
                let distance = self.read_value();
                QueryNode::Dilate {
                    distance,
                    inner: Box::new(self.parse_unary()),
                }
            }
            _ => return None,
        };
        Some(node)
    }

    /// Read the rest of a plain word. `-` inside a word belongs to it.
    fn read_word(&mut self) {
        while !self.is_eof() {
            let ch = self.peek_char().unwrap_or(' ');
            if ch.is_whitespace() || matches!(ch, '+' | '/' | '(' | ')' | '"' | '%') {
                break;
            }
            if self.remaining().starts_with("<->") {
                break;
            }
            self.advance();
        }
    }

    /// Read a field value until whitespace or a closing paren
    fn read_value(&mut self) -> String {
        let start = self.pos;
        while !self.is_eof() {
            let ch = self.peek_char().unwrap_or(' ');
            if ch.is_whitespace() || ch == ')' {
                break;
            }
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }

    fn at_operator(&self) -> bool {
        matches!(self.peek_char(), Some('+' | '/' | '-')) || self.remaining().starts_with("<->")
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.peek_char().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn remaining(&self) -> &str {
        &self.input[self.pos..]
    }
}

fn boxed(node: QueryNode) -> Option<Box<QueryNode>> {
    match node {
        QueryNode::Empty => None,
        node => Some(Box::new(node)),
    }
}

fn join(op: SetOperator, left: QueryNode, right: QueryNode) -> QueryNode {
    match (left, right) {
        (QueryNode::Empty, node) | (node, QueryNode::Empty) => node,
        (left, right) => QueryNode::Binary {
            op,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> QueryNode {
        QueryNode::Text {
            text: s.to_string(),
            kind: QueryKind::Mixed,
        }
    }

    fn bin(op: SetOperator, left: Option<QueryNode>, right: Option<QueryNode>) -> QueryNode {
        QueryNode::Binary {
            op,
            left: left.map(Box::new),
            right: right.map(Box::new),
        }
    }

    #[test]
    fn test_single_term() {
        assert_eq!(parse_query("mill").root, text("mill"));
        assert_eq!(parse_query("  mill  ").root, text("mill"));
    }

    #[test]
    fn test_empty_query() {
        assert!(parse_query("").is_empty());
        assert!(parse_query("   ").is_empty());
        assert!(parse_query("()").is_empty());
    }

    #[test]
    fn test_juxtaposition_intersects() {
        let q = parse_query("mill pond");
        assert_eq!(q.root, bin(SetOperator::Intersect, Some(text("mill")), Some(text("pond"))));
    }

    #[test]
    fn test_operators() {
        let q = parse_query("a + b");
        assert_eq!(q.root, bin(SetOperator::Union, Some(text("a")), Some(text("b"))));

        let q = parse_query("a/b");
        assert_eq!(q.root, bin(SetOperator::Intersect, Some(text("a")), Some(text("b"))));

        let q = parse_query("a - b");
        assert_eq!(q.root, bin(SetOperator::Difference, Some(text("a")), Some(text("b"))));

        let q = parse_query("a <-> b");
        assert_eq!(q.root, bin(SetOperator::Between, Some(text("a")), Some(text("b"))));
    }

    #[test]
    fn test_left_associative() {
        let q = parse_query("a - b + c");
        let inner = bin(SetOperator::Difference, Some(text("a")), Some(text("b")));
        assert_eq!(q.root, bin(SetOperator::Union, Some(inner), Some(text("c"))));
    }

    #[test]
    fn test_parentheses_group() {
        let q = parse_query("a - (b + c)");
        let inner = bin(SetOperator::Union, Some(text("b")), Some(text("c")));
        assert_eq!(q.root, bin(SetOperator::Difference, Some(text("a")), Some(inner)));
    }

    #[test]
    fn test_hyphen_inside_word() {
        assert_eq!(parse_query("saint-denis").root, text("saint-denis"));
    }

    #[test]
    fn test_missing_operands() {
        let q = parse_query("mill +");
        assert_eq!(q.root, bin(SetOperator::Union, Some(text("mill")), None));

        let q = parse_query("- mill");
        assert_eq!(q.root, bin(SetOperator::Difference, None, Some(text("mill"))));

        let q = parse_query("/");
        assert_eq!(q.root, bin(SetOperator::Intersect, None, None));
    }

    #[test]
    fn test_phrase_keeps_quotes() {
        assert_eq!(parse_query("\"old mill\"").root, text("\"old mill\""));
        assert!(parse_query("\"\"").is_empty());
    }

    #[test]
    fn test_completion_markers_stay_in_text() {
        assert_eq!(parse_query("mil*").root, text("mil*"));
        assert_eq!(parse_query("*ill").root, text("*ill"));
    }

    #[test]
    fn test_kind_fields() {
        let q = parse_query("items:mill");
        assert_eq!(
            q.root,
            QueryNode::Text {
                text: "mill".to_string(),
                kind: QueryKind::Items
            }
        );

        let q = parse_query("regions:\"new york\"");
        assert_eq!(
            q.root,
            QueryNode::Text {
                text: "\"new york\"".to_string(),
                kind: QueryKind::Regions
            }
        );
    }

    #[test]
    fn test_unknown_field_is_word() {
        assert_eq!(parse_query("foo:bar").root, text("foo:bar"));
    }

    #[test]
    fn test_full_match_prefix() {
        let q = parse_query("%mill");
        assert_eq!(q.root, QueryNode::FullMatch(Box::new(text("mill"))));

        let q = parse_query("%(a + b)");
        let inner = bin(SetOperator::Union, Some(text("a")), Some(text("b")));
        assert_eq!(q.root, QueryNode::FullMatch(Box::new(inner)));
    }

    #[test]
    fn test_spatial_constructs() {
        assert_eq!(
            parse_query("rect:1,2,3,4").root,
            QueryNode::Geometry {
                shape: "rect".to_string(),
                value: "1,2,3,4".to_string()
            }
        );
        assert_eq!(parse_query("region:42").root, QueryNode::Region("42".to_string()));
        assert_eq!(parse_query("near:mill").root, QueryNode::Near("mill".to_string()));
        assert_eq!(
            parse_query("north:mill").root,
            QueryNode::Compass {
                direction: "north".to_string(),
                inner: Box::new(text("mill"))
            }
        );
        assert_eq!(
            parse_query("dilate:500 mill").root,
            QueryNode::Dilate {
                distance: "500".to_string(),
                inner: Box::new(text("mill"))
            }
        );
    }

    #[test]
    fn test_unbalanced_parens() {
        let q = parse_query("(a + b");
        assert_eq!(q.root, bin(SetOperator::Union, Some(text("a")), Some(text("b"))));

        let q = parse_query("a) b");
        assert_eq!(q.root, bin(SetOperator::Intersect, Some(text("a")), Some(text("b"))));
    }

    #[test]
    fn test_never_panics_on_garbage() {
        for input in ["%%%", "((((", "))))", "<-><->", "\"", "items:", "é+ü", "a<-", "-+-/"] {
            let _ = parse_query(input);
        }
    }
}
