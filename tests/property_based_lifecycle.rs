// Property-Based Testing for the document lifecycle
// Arbitrary action sequences must never move a document backwards

mod fixtures;

use fixtures::signature;
use haulsign::documents::NewDocument;
use haulsign::{
    ActionRequest, Charges, Document, DocumentAction, LifecycleController, SignaturePolicy,
};
use proptest::prelude::*;

fn action_strategy() -> impl Strategy<Value = DocumentAction> {
    prop::sample::select(DocumentAction::ALL.to_vec())
}

fn policy_strategy() -> impl Strategy<Value = SignaturePolicy> {
    prop_oneof![
        Just(SignaturePolicy::CarrierAuthoritative),
        Just(SignaturePolicy::BothRequired),
    ]
}

fn document_strategy() -> impl Strategy<Value = Document> {
    prop_oneof![
        Just(NewDocument::rate_confirmation(Charges::flat(100_000))),
        Just(NewDocument::bill_of_lading(Charges::flat(0))),
    ]
    .prop_map(Document::new)
}

fn request_for(document: &Document, action: DocumentAction) -> ActionRequest {
    let request = ActionRequest::new(document.id().clone(), action);
    match action.signer_role() {
        Some(role) => request.with_signature(signature("Prop Signer", role)),
        None => request,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn status_rank_never_decreases(
        initial in document_strategy(),
        policy in policy_strategy(),
        actions in prop::collection::vec(action_strategy(), 0..24),
    ) {
        let controller = LifecycleController::new(policy);
        let mut document = initial;

        for action in actions {
            let before = document.clone();
            match controller.apply(&document, &request_for(&document, action)) {
                Ok(transition) => {
                    let next = transition.document;
                    prop_assert!(next.status().rank() >= before.status().rank());
                    prop_assert!(before.status().allows_move_to(next.status()));
                    prop_assert_eq!(next.version(), before.version() + 1);
                    prop_assert_eq!(next.kind(), before.kind());
                    document = next;
                }
                Err(_) => {
                    // Rejected actions leave the input untouched.
                    prop_assert_eq!(&document, &before);
                }
            }
            prop_assert!(!document.status().is_terminal() || controller.allowed_actions(&document).is_empty());
        }
    }

    #[test]
    fn rejected_actions_are_never_allowed(
        initial in document_strategy(),
        policy in policy_strategy(),
        actions in prop::collection::vec(action_strategy(), 0..12),
    ) {
        let controller = LifecycleController::new(policy);
        let mut document = initial;

        for action in actions {
            let allowed = controller.allowed_actions(&document).contains(&action);
            let outcome = controller.apply(&document, &request_for(&document, action));
            prop_assert_eq!(allowed, outcome.is_ok());
            if let Ok(transition) = outcome {
                document = transition.document;
            }
        }
    }
}
