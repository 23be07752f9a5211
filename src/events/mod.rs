//! # Status Topic Transport
//!
//! Publish/subscribe plumbing that carries bean-change events between queue
//! processes and the listeners that aggregate them.
//!
//! ## Overview
//!
//! - [`Publisher`] broadcasts the current state of a bean
//! - [`Subscription`] connects [`BeanListener`]s to a topic and can be
//!   disconnected at any time
//! - [`TopicPublisher`] / [`TopicSubscription`] implement both over a
//!   `tokio::sync::broadcast` channel
//! - [`MappedPublisher`] lets a process publish its concrete bean type onto a
//!   topic carrying a wider type such as [`QueueAtom`](crate::models::QueueAtom)

pub mod publisher;
pub mod subscription;

pub use publisher::{BeanEvent, MappedPublisher, Publisher, TopicPublisher};
pub use subscription::{BeanListener, Subscription, TopicSubscription};
