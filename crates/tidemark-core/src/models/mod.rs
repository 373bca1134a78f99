//! Record models shared by the local store, remote client, and reconciler.

mod attachment;
mod event;
mod note;
mod owner;
mod record;
mod reminder;

pub use attachment::AttachmentRef;
pub use event::HistoryEvent;
pub use note::Note;
pub use owner::{Owner, OwnerId};
pub use record::{HasAttachments, RecordId, SyncedRecord};
pub use reminder::Reminder;
