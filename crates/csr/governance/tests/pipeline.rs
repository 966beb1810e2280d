use csr_crypto::{Ed25519Signer, SigningService};
use csr_governance::{
    GovernanceError, LedgerConfig, LedgerRuntime, RejectionStage, SignerEntry,
};
use csr_hasher::Digest;
use csr_ledger::CommitError;
use csr_patch::{Patch, PatchOp};
use csr_quorum::QuorumError;
use csr_types::{CsrEntry, EntryContent, EntryStatus, SignerId};
use csr_verifier::VerificationError;
use serde_json::json;
use std::sync::{Arc, Barrier};
use std::thread;

struct Fixture {
    runtime: LedgerRuntime,
    signers: Vec<Ed25519Signer>,
}

fn fixture(threshold: usize) -> Fixture {
    let signers: Vec<Ed25519Signer> = ["alice", "bob", "carol"]
        .into_iter()
        .map(|id| Ed25519Signer::generate(SignerId::new(id)))
        .collect();
    let mut config = LedgerConfig::default();
    config.quorum.threshold = threshold;
    config.signers = signers
        .iter()
        .map(|s| SignerEntry {
            id: s.signer_id().clone(),
            public_key: s.public_key().to_hex(),
            authorized: true,
        })
        .collect();
    Fixture {
        runtime: LedgerRuntime::open(config).unwrap(),
        signers,
    }
}

fn commit_genesis(f: &Fixture) -> Digest {
    let proposer = f.runtime.proposer("genesis");
    let id = proposer.propose(json!({"mode": "LOCKED_DOWN"})).unwrap();
    proposer.attest(id, &f.signers[0]).unwrap();
    proposer.attest(id, &f.signers[1]).unwrap();
    proposer.commit(id).unwrap()
}

#[test]
fn two_of_three_commit_then_stale_proposer_rebases() {
    let f = fixture(2);
    let h0 = commit_genesis(&f);
    let genesis = f.runtime.ledger().get_entry(&h0).unwrap().unwrap();
    assert_eq!(genesis.parent_hash(), None);
    assert_eq!(genesis.status, EntryStatus::Committed);

    let first = f.runtime.proposer("ops-1");
    let second = f.runtime.proposer("ops-2");
    let winner = first
        .propose(json!({"mode": "EVOLUTIONARY_AUTONOMY"}))
        .unwrap();
    let loser = second
        .propose(json!({"mode": "LOCKED_DOWN", "replicas": 5}))
        .unwrap();

    let staged = f.runtime.gate().get(winner).unwrap();
    assert_eq!(
        staged.entry.content.forward,
        Patch::new(vec![PatchOp::Replace {
            path: "/mode".into(),
            value: json!("EVOLUTIONARY_AUTONOMY"),
        }])
    );
    assert_eq!(
        staged.entry.content.inverse,
        Patch::new(vec![PatchOp::Replace {
            path: "/mode".into(),
            value: json!("LOCKED_DOWN"),
        }])
    );

    assert!(!first.attest(winner, &f.signers[0]).unwrap().is_ratified());
    assert!(first.attest(winner, &f.signers[2]).unwrap().is_ratified());
    let h1 = first.commit(winner).unwrap();
    let committed = f.runtime.ledger().get_entry(&h1).unwrap().unwrap();
    assert_eq!(committed.parent_hash(), Some(&h0));
    assert_eq!(f.runtime.ledger().get_head(), Some(h1.clone()));

    second.attest(loser, &f.signers[1]).unwrap();
    second.attest(loser, &f.signers[2]).unwrap();
    let err = second.commit(loser).unwrap_err();
    assert_eq!(err.stale_parent(), Some(Some(&h1)));
    let rejected = err.rejected_artifact().unwrap().clone();
    assert_eq!(rejected.status(), EntryStatus::Rejected);

    let records = f.runtime.audit().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].stage, RejectionStage::Commit);
    assert_eq!(records[0].artifact_id, loser);

    let rebased = second.rebase(&rejected).unwrap();
    let restaged = f.runtime.gate().get(rebased).unwrap();
    assert_eq!(restaged.entry.parent_hash(), Some(&h1));
    assert_ne!(restaged.version_hash(), rejected.version_hash());
    assert!(restaged.entry.quorum_attestation.is_empty());

    second.attest(rebased, &f.signers[0]).unwrap();
    second.attest(rebased, &f.signers[1]).unwrap();
    let h2 = second.commit(rebased).unwrap();

    let ledger = f.runtime.ledger();
    assert_eq!(ledger.get_head(), Some(h2.clone()));
    assert_eq!(ledger.verify_chain().unwrap().length, 3);
    assert_eq!(
        ledger.replay().unwrap(),
        json!({"mode": "LOCKED_DOWN", "replicas": 5})
    );
    assert_eq!(
        ledger.rollback_state(&h1).unwrap(),
        json!({"mode": "EVOLUTIONARY_AUTONOMY"})
    );
    assert_eq!(
        ledger.rollback_state(&h0).unwrap(),
        json!({"mode": "LOCKED_DOWN"})
    );
}

#[test]
fn repeated_attestation_from_one_signer_never_ratifies() {
    let f = fixture(2);
    let proposer = f.runtime.proposer("ops");
    let id = proposer.propose(json!({"mode": "LOCKED_DOWN"})).unwrap();

    proposer.attest(id, &f.signers[0]).unwrap();
    for _ in 0..3 {
        let err = proposer.attest(id, &f.signers[0]).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::Quorum(QuorumError::DuplicateAttestation { .. })
        ));
    }
    assert!(matches!(
        proposer.commit(id),
        Err(GovernanceError::Quorum(QuorumError::QuorumNotMet { have: 1, need: 2 }))
    ));
    assert!(f.runtime.gate().get(id).is_some());
    assert_eq!(f.runtime.ledger().get_head(), None);
}

#[test]
fn one_bit_hash_corruption_is_rejected_before_commit() {
    let f = fixture(2);
    let h0 = commit_genesis(&f);
    let parent = f.runtime.ledger().fetch_latest().unwrap().unwrap();

    let content = EntryContent::successor(
        &parent,
        json!({"mode": "EVOLUTIONARY_AUTONOMY"}),
        SignerId::new("ops"),
    );
    let mut entry = CsrEntry::seal(content, f.runtime.ledger().verifier().policy()).unwrap();
    let mut bytes = entry.version_hash.as_bytes().to_vec();
    bytes[0] ^= 0x01;
    entry.version_hash = Digest::from_bytes(bytes);

    let err = f.runtime.proposer("ops").submit(entry).unwrap_err();
    assert!(matches!(
        err,
        GovernanceError::Verification(VerificationError::HashMismatch { .. })
    ));
    assert!(f.runtime.gate().staged_ids().is_empty());
    assert_eq!(f.runtime.ledger().get_head(), Some(h0));

    let records = f.runtime.audit().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].stage, RejectionStage::Validation);
}

#[test]
fn concurrent_commits_against_one_parent_have_a_single_winner() {
    const CONTENDERS: usize = 8;
    let f = fixture(2);
    let h0 = commit_genesis(&f);

    let mut staged = Vec::new();
    for n in 0..CONTENDERS {
        let proposer = f.runtime.proposer(format!("ops-{n}").as_str());
        let id = proposer.propose(json!({"mode": "LOCKED_DOWN", "shard": n})).unwrap();
        proposer.attest(id, &f.signers[0]).unwrap();
        proposer.attest(id, &f.signers[1]).unwrap();
        staged.push((proposer, id));
    }

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let handles: Vec<_> = staged
        .into_iter()
        .map(|(proposer, id)| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                proposer.commit(id)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<&Digest> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let winner = winners[0].clone();
    for result in &results {
        if let Err(err) = result {
            assert!(matches!(
                err,
                GovernanceError::Rejected {
                    source: CommitError::StaleParent { current_head: Some(head) },
                    ..
                } if *head == winner
            ));
        }
    }

    let head = f.runtime.ledger().fetch_latest().unwrap().unwrap();
    assert_eq!(head.version_hash, winner);
    assert_eq!(head.parent_hash(), Some(&h0));
    assert_eq!(f.runtime.audit().len(), CONTENDERS - 1);
}
