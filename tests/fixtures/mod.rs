// Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use haulsign::signature::{Point, Stroke};
use haulsign::{
    Charges, Document, DocumentId, InMemoryStore, LifecycleController, LifecycleService,
    NewDocument, Signature, SignaturePad, SignerRole,
};

pub fn memory_service() -> LifecycleService<InMemoryStore> {
    LifecycleService::new(Arc::new(InMemoryStore::new()), LifecycleController::default())
}

pub fn id(raw: &str) -> DocumentId {
    DocumentId::parse(raw).expect("valid document id")
}

pub fn rate_confirmation(raw_id: &str) -> NewDocument {
    NewDocument::rate_confirmation(Charges::flat(185_000)).with_id(id(raw_id))
}

pub fn bill_of_lading(raw_id: &str) -> NewDocument {
    NewDocument::bill_of_lading(Charges::flat(0)).with_id(id(raw_id))
}

/// A short two-segment scribble
pub fn scribble() -> Stroke {
    Stroke::new(vec![
        Point::new(40, 90),
        Point::new(120, 30),
        Point::new(260, 110),
    ])
}

pub fn pad(name: &str) -> SignaturePad {
    let mut pad = SignaturePad::default();
    pad.set_name(name);
    pad.add_stroke(scribble());
    pad
}

pub fn signature(name: &str, role: SignerRole) -> Signature {
    pad(name).submit(role).expect("valid signature")
}

pub fn reload(document: &Document) -> Document {
    let json = serde_json::to_string(document).expect("serialize");
    serde_json::from_str(&json).expect("deserialize")
}
