//! Shared builders for integration tests

#![allow(dead_code)]

use benchtrack_history::{CommitRef, Entry, Measurement, Person};

pub const SUITE: &str = "Benchmark";
pub const ERC20: &str = "Block import/Block import ERC20 transfers";

pub fn commit(id: &str) -> CommitRef {
    let person = Person {
        email: "ci@example.com".to_string(),
        name: "CI".to_string(),
        username: Some("ci".to_string()),
    };
    CommitRef {
        author: person.clone(),
        committer: person,
        distinct: true,
        id: id.to_string(),
        message: format!("commit {}", id),
        timestamp: "2025-07-18T22:01:22Z".to_string(),
        tree_id: String::new(),
        url: format!("https://github.com/example/repo/commit/{}", id),
    }
}

pub fn entry(id: &str, date: i64, value: f64) -> Entry {
    Entry::new(
        commit(id),
        date,
        "cargo",
        vec![Measurement::new(ERC20, value, "± 1", "ns/iter")],
    )
}
