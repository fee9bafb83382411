use casework_core::case::PeriodKey;
use casework_core::state_machine::{ReviewEvent, ReviewState, TwoPersonReview};
use proptest::prelude::*;
use uuid::Uuid;

fn caseworker() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["S111111", "B222222", "C333333", "D444444"])
        .prop_map(str::to_string)
}

fn review_event() -> impl Strategy<Value = ReviewEvent> {
    prop_oneof![
        (caseworker(), caseworker()).prop_map(|(submitter, reviewer)| {
            ReviewEvent::SubmitToReviewer {
                submitter,
                reviewer,
            }
        }),
        caseworker().prop_map(|reviewer| ReviewEvent::Return { reviewer }),
        caseworker().prop_map(|approver| ReviewEvent::Finalize {
            approver,
            payment_reference: "ref-1".to_string(),
        }),
    ]
}

fn review() -> TwoPersonReview {
    TwoPersonReview::new(PeriodKey {
        vedtaksperiode_id: Uuid::new_v4(),
        utbetaling_id: Uuid::new_v4(),
    })
}

proptest! {
    #[test]
    fn finalize_succeeds_only_for_a_distinct_approver(
        submitter in caseworker(),
        reviewer in caseworker(),
        approver in caseworker(),
    ) {
        prop_assume!(submitter != reviewer);
        let mut review = review();
        review.submit_to_reviewer(&submitter, &reviewer).unwrap();

        let result = review.finalize(&approver, "ref-1");

        prop_assert_eq!(result.is_ok(), approver != submitter);
        if result.is_ok() {
            prop_assert_eq!(review.state, ReviewState::Finalized);
        } else {
            prop_assert_eq!(review.state, ReviewState::AwaitingSecondReviewer);
            prop_assert!(review.approver.is_none());
        }
    }

    #[test]
    fn submitter_can_never_return_their_own_decision(submitter in caseworker()) {
        let mut review = review();
        review.submit_to_reviewer(&submitter, "Z999999").unwrap();

        prop_assert!(review.return_to_submitter(&submitter).is_err());
        prop_assert!(!review.returned);
    }

    #[test]
    fn finalized_review_never_has_submitter_as_approver(
        events in prop::collection::vec(review_event(), 1..12)
    ) {
        let mut review = review();
        for event in events {
            let before = review.clone();
            if review.apply(event).is_err() {
                // A rejected event leaves the review untouched
                prop_assert_eq!(&review, &before);
            }
        }

        if review.is_finalized() {
            prop_assert!(review.approver.is_some());
            prop_assert_ne!(&review.approver, &review.submitter);
        }
    }
}
