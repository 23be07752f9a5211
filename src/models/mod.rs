//! # Queue Bean Models
//!
//! Beans that flow through the job queue and active queues, together with
//! the traits the processing engine uses to treat them uniformly.

macro_rules! impl_queueable {
    ($($bean:ty),+ $(,)?) => {
        $(
            impl $crate::models::bean::Queueable for $bean {
                fn core(&self) -> &$crate::models::bean::BeanCore {
                    &self.core
                }

                fn core_mut(&mut self) -> &mut $crate::models::bean::BeanCore {
                    &mut self.core
                }
            }
        )+
    };
}

macro_rules! impl_child_queue {
    ($($bean:ty),+ $(,)?) => {
        $(
            impl $crate::models::bean::HasChildQueue for $bean {
                fn queue_message(&self) -> Option<&str> {
                    self.queue_message.as_deref()
                }

                fn set_queue_message(&mut self, message: String) {
                    self.queue_message = Some(message);
                }
            }
        )+
    };
}

pub mod atoms;
pub mod bean;
pub mod scan;
pub mod task;

pub use atoms::{MonitorAtom, MoveAtom, Position, QueueAtom, ScanAtom, SubTaskAtom};
pub use bean::{BeanCore, HasAtomQueue, HasChildQueue, Queueable};
pub use scan::{ScanBean, ScanRequest};
pub use task::TaskBean;
