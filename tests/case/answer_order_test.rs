use crate::common::*;
use casework_core::case::CaseRepository;
use casework_core::decision::Decision;
use casework_core::orchestration::{DomainEvent, PassOutcome};
use proptest::prelude::*;
use uuid::Uuid;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn any_answer_order_reaches_the_same_decision(
        order in Just(vec![0usize, 1, 2]).prop_shuffle(),
        redeliver in any::<bool>(),
    ) {
        let (outcomes, decision, published) = tokio_test::block_on(async {
            let harness = Harness::new();
            let need = approval_need();
            let correlation_id = Uuid::new_v4();
            let answers = clean_answers(&need);

            harness
                .orchestrator
                .handle(start_approval(correlation_id, &need))
                .await
                .unwrap();

            let mut outcomes = Vec::new();
            for index in &order {
                let event = DomainEvent::answer(correlation_id, answers[*index].clone());
                outcomes.push(harness.orchestrator.handle(event.clone()).await.unwrap());
                if redeliver {
                    outcomes.push(harness.orchestrator.handle(event).await.unwrap());
                }
            }

            let decision = harness
                .repository
                .decision(&need.period_key())
                .await
                .unwrap()
                .map(|record| record.decision);
            (outcomes, decision, harness.publisher.requests().len())
        });

        prop_assert_eq!(outcomes.last(), Some(&if redeliver {
            PassOutcome::Duplicate
        } else {
            PassOutcome::Completed
        }));
        prop_assert_eq!(
            outcomes.iter().filter(|o| **o == PassOutcome::Completed).count(),
            1
        );
        prop_assert_eq!(decision, Some(Decision::Automatic));
        prop_assert_eq!(published, 3);
    }
}
