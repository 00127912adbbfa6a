/**
Boundary with the backing store. The composer and the evaluator work on materialized sequences;
everything that reads or writes documents goes through `AnnotationStore`. `InMemoryStore` is a
complete implementation kept in memory, usable by hosts without a database and by the tests.

A user-document is one annotator's annotation set on one document. Only the user-documents marked
visible are shown to other annotators.
*/
use crate::model::{AnnotationSet, Annotator, AnnotatorId, Entity, TypeRef};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced at the store boundary.
#[derive(Debug)]
pub enum StoreError {
    /// No document with this id.
    DocumentNotFound(String),
    /// The store could not be reached.
    Unavailable(String),
    /// A stored record could not be read back.
    MalformedRecord(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
            Self::MalformedRecord(details) => write!(f, "malformed stored record: {details}"),
        }
    }
}

impl Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedRecord(value.to_string())
    }
}

/// Store interface consumed by the service layer.
pub trait AnnotationStore {
    /// Text of the document. `Ok(None)` when the document exists but has no stored content.
    fn text(&self, document_id: &str) -> StoreResult<Option<String>>;
    /// Annotation sets to compose for `requesting_user`: their own set, the set of `prediction`
    /// when given, and every visible set.
    fn annotation_sets(
        &self,
        document_id: &str,
        requesting_user: &AnnotatorId,
        prediction: Option<&AnnotatorId>,
    ) -> StoreResult<Vec<AnnotationSet>>;
    /// Entities of one annotator on the document, whatever the visibility. Empty when the
    /// annotator has not annotated the document.
    fn entities_for(&self, document_id: &str, annotator: &AnnotatorId) -> StoreResult<Vec<Entity>>;
    fn entity_types(&self, document_id: &str) -> StoreResult<Vec<TypeRef>>;
    fn relation_types(&self, document_id: &str) -> StoreResult<Vec<TypeRef>>;
    /// Replaces the whole annotation set of `set.annotator` on the document. The user-document is
    /// created when missing, with the given visibility; an existing one keeps its visibility.
    fn replace_annotations(
        &mut self,
        document_id: &str,
        set: AnnotationSet,
        visible: bool,
    ) -> StoreResult<()>;
}

/// Summary of one user-document, as listed for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDocumentInfo {
    pub id: String,
    pub annotator: Annotator,
    pub visible: bool,
    pub entities: usize,
    pub relations: usize,
    #[serde(rename = "fromCurrentUser")]
    pub from_current_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct UserDocument {
    id: String,
    #[serde(default = "visible_by_default")]
    visible: bool,
    set: AnnotationSet,
}

fn visible_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
struct StoredDocument {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "entityTypes")]
    entity_types: Vec<TypeRef>,
    #[serde(default, rename = "relationTypes")]
    relation_types: Vec<TypeRef>,
    #[serde(default, rename = "userDocuments")]
    user_documents: BTreeMap<AnnotatorId, UserDocument>,
}

/// `AnnotationStore` kept in memory. Sets are returned in annotator id order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InMemoryStore {
    documents: BTreeMap<String, StoredDocument>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a store from its JSON form, as written by `to_json`.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let store: InMemoryStore = serde_json::from_str(json)?;
        for (document_id, document) in store.documents.iter() {
            for (annotator, user_document) in document.user_documents.iter() {
                if user_document.set.annotator.id != *annotator {
                    return Err(StoreError::MalformedRecord(format!(
                        "user document {} of {document_id} is keyed by {annotator} but belongs to {}",
                        user_document.id, user_document.set.annotator.id
                    )));
                }
            }
        }
        Ok(store)
    }

    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Adds a document, or replaces the text of an existing one.
    pub fn insert_document<S: Into<String>>(&mut self, document_id: S, text: Option<String>) {
        self.documents.entry(document_id.into()).or_default().text = text;
    }

    pub fn set_types(
        &mut self,
        document_id: &str,
        entity_types: Vec<TypeRef>,
        relation_types: Vec<TypeRef>,
    ) -> StoreResult<()> {
        let document = self.document_mut(document_id)?;
        document.entity_types = entity_types;
        document.relation_types = relation_types;
        Ok(())
    }

    /// Shows or hides the annotations of `annotator` to the other annotators.
    pub fn set_visibility(
        &mut self,
        document_id: &str,
        annotator: &AnnotatorId,
        visible: bool,
    ) -> StoreResult<()> {
        let document = self.document_mut(document_id)?;
        match document.user_documents.get_mut(annotator) {
            Some(user_document) => {
                user_document.visible = visible;
                Ok(())
            }
            None => Err(StoreError::DocumentNotFound(crate::service::user_document_id(
                annotator,
                document_id,
            ))),
        }
    }

    /// Lists the user-documents of a document, flagging the one of `current_user`.
    pub fn user_documents_for(
        &self,
        document_id: &str,
        current_user: &AnnotatorId,
    ) -> StoreResult<Vec<UserDocumentInfo>> {
        let document = self.document(document_id)?;
        Ok(document
            .user_documents
            .values()
            .map(|ud| UserDocumentInfo {
                id: ud.id.clone(),
                annotator: ud.set.annotator.clone(),
                visible: ud.visible,
                entities: ud.set.entities.len(),
                relations: ud.set.relations.len(),
                from_current_user: ud.set.annotator.id == *current_user,
            })
            .collect())
    }

    /// Removes a document and all its user-documents.
    pub fn delete_document(&mut self, document_id: &str) -> StoreResult<()> {
        match self.documents.remove(document_id) {
            Some(_) => Ok(()),
            None => Err(StoreError::DocumentNotFound(String::from(document_id))),
        }
    }

    fn document(&self, document_id: &str) -> StoreResult<&StoredDocument> {
        self.documents
            .get(document_id)
            .ok_or_else(|| StoreError::DocumentNotFound(String::from(document_id)))
    }

    fn document_mut(&mut self, document_id: &str) -> StoreResult<&mut StoredDocument> {
        self.documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::DocumentNotFound(String::from(document_id)))
    }
}

impl AnnotationStore for InMemoryStore {
    fn text(&self, document_id: &str) -> StoreResult<Option<String>> {
        Ok(self.document(document_id)?.text.clone())
    }

    fn annotation_sets(
        &self,
        document_id: &str,
        requesting_user: &AnnotatorId,
        prediction: Option<&AnnotatorId>,
    ) -> StoreResult<Vec<AnnotationSet>> {
        let document = self.document(document_id)?;
        Ok(document
            .user_documents
            .iter()
            .filter(|(annotator, ud)| {
                ud.visible || *annotator == requesting_user || Some(*annotator) == prediction
            })
            .map(|(_, ud)| ud.set.clone())
            .collect())
    }

    fn entities_for(&self, document_id: &str, annotator: &AnnotatorId) -> StoreResult<Vec<Entity>> {
        let document = self.document(document_id)?;
        Ok(document
            .user_documents
            .get(annotator)
            .map(|ud| ud.set.entities.clone())
            .unwrap_or_default())
    }

    fn entity_types(&self, document_id: &str) -> StoreResult<Vec<TypeRef>> {
        Ok(self.document(document_id)?.entity_types.clone())
    }

    fn relation_types(&self, document_id: &str) -> StoreResult<Vec<TypeRef>> {
        Ok(self.document(document_id)?.relation_types.clone())
    }

    fn replace_annotations(
        &mut self,
        document_id: &str,
        set: AnnotationSet,
        visible: bool,
    ) -> StoreResult<()> {
        let document = self.document_mut(document_id)?;
        let annotator = set.annotator.id.clone();
        match document.user_documents.get_mut(&annotator) {
            Some(user_document) => user_document.set = set,
            None => {
                let id = crate::service::user_document_id(&annotator, document_id);
                debug!("event=user_document_created module=store id={id} visible={visible}");
                document
                    .user_documents
                    .insert(annotator, UserDocument { id, visible, set });
            }
        }
        Ok(())
    }
}
