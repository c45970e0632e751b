use chrono::{DateTime, Utc};

use super::models::{
    CollectionSelector, CompositeFilter, CompositeOperator, FieldFilter, FieldOperator,
    FieldReference, Filter, StructuredQuery,
};
use super::value::scalar_to_value;

/// Values a query condition can compare against.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    List(Vec<ScalarValue>),
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::String(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::String(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Integer(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Integer(value.into())
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Double(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for ScalarValue {
    fn from(value: DateTime<Utc>) -> Self {
        ScalarValue::Timestamp(value)
    }
}

impl From<Vec<ScalarValue>> for ScalarValue {
    fn from(value: Vec<ScalarValue>) -> Self {
        ScalarValue::List(value)
    }
}

/// Comparison requested by a [`QueryCondition`]. `None` disables the condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    None,
    Equal,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    ArrayContains,
    NotEqual,
}

impl ConditionOperator {
    fn field_operator(self) -> Option<FieldOperator> {
        match self {
            ConditionOperator::None => None,
            ConditionOperator::Equal => Some(FieldOperator::Equal),
            ConditionOperator::LessThan => Some(FieldOperator::LessThan),
            ConditionOperator::GreaterThan => Some(FieldOperator::GreaterThan),
            ConditionOperator::LessThanOrEqual => Some(FieldOperator::LessThanOrEqual),
            ConditionOperator::GreaterThanOrEqual => Some(FieldOperator::GreaterThanOrEqual),
            ConditionOperator::ArrayContains => Some(FieldOperator::ArrayContains),
            ConditionOperator::NotEqual => Some(FieldOperator::NotEqual),
        }
    }
}

/// A `(field, operator, value)` triple as supplied by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: ScalarValue,
}

impl QueryCondition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<ScalarValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

impl<F, V> From<(F, ConditionOperator, V)> for QueryCondition
where
    F: Into<String>,
    V: Into<ScalarValue>,
{
    fn from((field, operator, value): (F, ConditionOperator, V)) -> Self {
        QueryCondition::new(field, operator, value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: FieldOperator,
    pub value: ScalarValue,
}

/// A conjunctive query over a single collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection_id: String,
    predicates: Vec<Predicate>,
}

impl Query {
    /// Creates a query matching every document of `collection_id`.
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            predicates: Vec::new(),
        }
    }

    /// Adds a predicate; all predicates must hold for a document to match.
    pub fn filter(
        mut self,
        field: impl Into<String>,
        op: FieldOperator,
        value: impl Into<ScalarValue>,
    ) -> Self {
        self.predicates.push(Predicate {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub(crate) fn to_structured_query(&self) -> StructuredQuery {
        let mut filters: Vec<Filter> = self
            .predicates
            .iter()
            .map(|p| {
                Filter::FieldFilter(FieldFilter {
                    field: FieldReference {
                        field_path: p.field.clone(),
                    },
                    op: p.op,
                    value: scalar_to_value(&p.value),
                })
            })
            .collect();

        let where_clause = match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::CompositeFilter(CompositeFilter {
                op: CompositeOperator::And,
                filters,
            })),
        };

        StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: self.collection_id.clone(),
            }],
            where_clause,
        }
    }
}

/// Appends one predicate per condition, in order, skipping `None` operators.
pub fn build(base: Query, conditions: &[QueryCondition]) -> Query {
    conditions.iter().fold(base, |query, condition| {
        match condition.operator.field_operator() {
            Some(op) => query.filter(condition.field.clone(), op, condition.value.clone()),
            None => query,
        }
    })
}
