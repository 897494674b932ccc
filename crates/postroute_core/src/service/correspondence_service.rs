//! Correspondence write service.
//!
//! Wraps repository writes and tells the change observer which routes went
//! stale. Notification happens only after the write succeeded.

use crate::model::correspondence::{
    CorrespondentDraft, CorrespondentId, ItemDraft, ItemId, PostmarkDraft, PostmarkId,
};
use crate::model::place::PlaceId;
use crate::repo::correspondence_repo::CorrespondenceRepository;
use crate::repo::place_repo::RepoResult;
use crate::service::ChangeObserver;

pub struct CorrespondenceService<'obs, R: CorrespondenceRepository> {
    repo: R,
    observer: Option<&'obs dyn ChangeObserver>,
}

impl<'obs, R: CorrespondenceRepository> CorrespondenceService<'obs, R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: &'obs dyn ChangeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn create_correspondent(&self, draft: &CorrespondentDraft) -> RepoResult<CorrespondentId> {
        self.repo.create_correspondent(draft)
    }

    /// Moves a correspondent; every item they sent or received is affected.
    pub fn set_correspondent_place(
        &self,
        id: CorrespondentId,
        place_id: Option<PlaceId>,
    ) -> RepoResult<()> {
        self.repo.set_correspondent_place(id, place_id)?;
        if let Some(observer) = self.observer {
            observer.correspondent_changed(id);
        }
        Ok(())
    }

    pub fn create_postmark(&self, draft: &PostmarkDraft) -> RepoResult<PostmarkId> {
        self.repo.create_postmark(draft)
    }

    pub fn create_item(&self, draft: &ItemDraft) -> RepoResult<ItemId> {
        self.repo.create_item(draft)
    }

    pub fn set_sender(&self, item: ItemId, sender: Option<CorrespondentId>) -> RepoResult<()> {
        self.repo.set_item_sender(item, sender)?;
        self.item_changed(item);
        Ok(())
    }

    pub fn set_addressee(
        &self,
        item: ItemId,
        addressee: Option<CorrespondentId>,
    ) -> RepoResult<()> {
        self.repo.set_item_addressee(item, addressee)?;
        self.item_changed(item);
        Ok(())
    }

    pub fn set_censor(&self, item: ItemId, censor_place: Option<PlaceId>) -> RepoResult<()> {
        self.repo.set_item_censor(item, censor_place)?;
        self.item_changed(item);
        Ok(())
    }

    /// Returns the postmark's insertion position on the item.
    pub fn attach_postmark(&self, item: ItemId, postmark: PostmarkId) -> RepoResult<u32> {
        let position = self.repo.attach_postmark(item, postmark)?;
        self.item_changed(item);
        Ok(position)
    }

    pub fn detach_postmark(&self, item: ItemId, postmark: PostmarkId) -> RepoResult<()> {
        self.repo.detach_postmark(item, postmark)?;
        self.item_changed(item);
        Ok(())
    }

    fn item_changed(&self, item: ItemId) {
        if let Some(observer) = self.observer {
            observer.item_changed(item);
        }
    }
}
