/**
This module holds the records the backing store hands to the composer and the evaluator. They are
read-only: built from persisted rows at request time and dropped at the end of the request.
*/
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identity of whoever authored a set of annotations: the requesting user, another human
/// annotator, or the synthetic prediction engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct AnnotatorId(pub String);

impl AnnotatorId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AnnotatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AnnotatorId {
    fn from(value: &str) -> Self {
        Self(String::from(value))
    }
}

/// Entity or relation identifier. It is only unique inside the annotation set of its creator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct LocalId(pub String);

impl LocalId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LocalId {
    fn from(value: &str) -> Self {
        Self(String::from(value))
    }
}

/// Half-open character interval `[begin, end)` over the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

impl Span {
    /// Builds a span. Reversed bounds are swapped so that `begin <= end` always holds.
    pub fn new(begin: usize, end: usize) -> Self {
        if begin <= end {
            Span { begin, end }
        } else {
            Span {
                begin: end,
                end: begin,
            }
        }
    }
    pub fn len(&self) -> usize {
        self.end - self.begin
    }
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// Opaque reference to an entity or relation type. Neither component looks inside it; the
/// evaluator only compares it for equality and the composer passes it through.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct TypeRef {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(rename = "groupId")]
    pub group_id: String,
    pub group: String,
}

impl TypeRef {
    pub fn new<S: Into<String>>(id: S, code: S, name: S, group_id: S, group: S) -> Self {
        TypeRef {
            id: id.into(),
            code: code.into(),
            name: name.into(),
            group_id: group_id.into(),
            group: group.into(),
        }
    }

    /// Type reference where only the identifier is known. Handy for evaluation inputs.
    pub fn from_id<S: Into<String>>(id: S) -> Self {
        let id = id.into();
        TypeRef {
            code: id.clone(),
            name: id.clone(),
            id,
            ..Default::default()
        }
    }
}

/// An annotated span authored by `creator`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub id: LocalId,
    pub creator: AnnotatorId,
    pub span: Span,
    pub type_ref: TypeRef,
    pub label: Option<String>,
}

impl Entity {
    pub fn new<I: Into<LocalId>, C: Into<AnnotatorId>>(
        id: I,
        creator: C,
        span: Span,
        type_ref: TypeRef,
    ) -> Self {
        Entity {
            id: id.into(),
            creator: creator.into(),
            span,
            type_ref,
            label: None,
        }
    }
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.creator, self.id, self.type_ref.id, self.span
        )
    }
}

/// A typed link between two entities of the same creator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub id: LocalId,
    pub creator: AnnotatorId,
    pub subject: LocalId,
    pub object: LocalId,
    pub type_ref: TypeRef,
    pub label: Option<String>,
}

impl Relation {
    pub fn new<I, C>(id: I, creator: C, subject: I, object: I, type_ref: TypeRef) -> Self
    where
        I: Into<LocalId>,
        C: Into<AnnotatorId>,
    {
        Relation {
            id: id.into(),
            creator: creator.into(),
            subject: subject.into(),
            object: object.into(),
            type_ref,
            label: None,
        }
    }
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// An annotator and the name shown in the legend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotator {
    pub id: AnnotatorId,
    pub name: String,
}

impl Annotator {
    pub fn new<I: Into<AnnotatorId>, S: Into<String>>(id: I, name: S) -> Self {
        Annotator {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Everything a single annotator produced for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSet {
    pub annotator: Annotator,
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl AnnotationSet {
    pub fn new(annotator: Annotator) -> Self {
        AnnotationSet {
            annotator,
            entities: vec![],
            relations: vec![],
        }
    }
    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }
    pub fn with_relations(mut self, relations: Vec<Relation>) -> Self {
        self.relations = relations;
        self
    }
    /// Sorts the entities by local id. The sort is stable, so entities sharing an id keep their
    /// insertion order.
    pub fn sort_entities(&mut self) {
        self.entities.sort_by(|a, b| a.id.cmp(&b.id));
    }
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}
