//! crates/services/src/lib.rs
//!
//! Thread use cases: assembling the nested tree from the flat relation and
//! the mutations that append to it.

pub mod assembler;
pub mod likes;
pub mod mutation;
pub mod validation;

pub use assembler::TreeAssembler;
pub use mutation::{MutationService, ThreadRules};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use domains::{Author, NewDiscussion, NodeId, ThreadNode, UserId};
    use uuid::Uuid;

    pub fn author(name: &str) -> Author {
        Author {
            id: UserId(Uuid::new_v4()),
            name: name.to_string(),
        }
    }

    pub fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    pub fn root(by: &Author) -> ThreadNode {
        ThreadNode::root(
            by,
            NewDiscussion {
                title: "Ownership".into(),
                body: "How do lifetimes interact with async?".into(),
                ..Default::default()
            },
            at(0),
        )
    }

    pub fn reply(parent: NodeId, by: &Author, minutes: i64) -> ThreadNode {
        ThreadNode::reply(parent, by, format!("reply at {minutes}"), at(minutes))
    }
}
