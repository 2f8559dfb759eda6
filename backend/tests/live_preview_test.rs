/// Integration tests for preview resolution against the editable store, and
/// for switching between public and preview serving
use cms_snapshot::application::cms::{
    CmsError, CmsManager, CmsManagerSelector, CmsPageManager, CmsSnapshotManager,
    ResolutionContext, SequentialBlockInteractor, ServingMode, SourceKind,
};
use cms_snapshot::application::repositories::{PageRepository, SiteRepository};
use cms_snapshot::application::services::PublishService;
use cms_snapshot::domain::*;
use cms_snapshot::infrastructure::persistence::SqliteRepository;
use std::path::Path;
use tempfile::TempDir;

fn site() -> Site {
    Site::new(SiteId::new(1).unwrap(), "Main", "example.org")
}

fn home_page(text: &str) -> Page {
    let page_id = PageId::new(1).unwrap();
    let meta = PageMeta::new(page_id, *site().id(), "Home").with_url(PageUrl::new("/").unwrap());
    let mut page = Page::new(meta);

    let content = BlockId::new(10).unwrap();
    page.add_block(Block::new_container(content, page_id, "content", None)).unwrap();
    page.add_block(
        Block::new_child(
            BlockId::new(11).unwrap(),
            page_id,
            content,
            BlockType::new("text").unwrap(),
        )
        .with_setting("text", text),
    )
    .unwrap();
    page
}

/// Publish "Published", then edit the live page to "Draft" without publishing
async fn prepare_database(path: &Path) {
    let mut repo = SqliteRepository::new_with_path(path).unwrap();
    repo.save_site(site()).unwrap();
    repo.save(home_page("Published")).unwrap();

    let service = PublishService::new(repo);
    service.create_by_site(&site()).await.unwrap();

    let store = service.store();
    let mut store = store.lock().await;
    let mut draft = home_page("Draft");
    draft.meta_mut().set_edited(true);
    store.save(draft).unwrap();
}

fn text_of(manager: &dyn CmsManager, ctx: &mut ResolutionContext) -> String {
    manager
        .get_block(ctx, &BlockId::new(10).unwrap())
        .unwrap()
        .unwrap();
    manager
        .get_block(ctx, &BlockId::new(11).unwrap())
        .unwrap()
        .and_then(|block| block.setting("text"))
        .and_then(|text| text.as_str())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_preview_serves_unpublished_edits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cms.sqlite");
    prepare_database(&path).await;

    let mut repo = SqliteRepository::new_with_path(&path).unwrap();
    let interactor = SequentialBlockInteractor::starting_after(repo.last_block_id().unwrap());
    let manager = CmsPageManager::new(&mut repo, interactor);
    let mut ctx = ResolutionContext::new();

    let page = manager.get_page_by_url(&mut ctx, Some(&site()), "/").unwrap();
    assert!(!page.is_snapshot());
    assert!(page.meta().is_edited());
    assert_eq!(text_of(&manager, &mut ctx), "Draft");
}

#[tokio::test]
async fn test_missing_container_is_created_and_persisted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cms.sqlite");
    prepare_database(&path).await;

    let mut repo = SqliteRepository::new_with_path(&path).unwrap();
    let last = repo.last_block_id().unwrap();
    assert_eq!(last, Some(BlockId::new(11).unwrap()));

    let created = {
        let manager =
            CmsPageManager::new(&mut repo, SequentialBlockInteractor::starting_after(last));
        let mut ctx = ResolutionContext::new();
        let page = manager.get_page_by_id(&mut ctx, PageId::new(1).unwrap()).unwrap();

        let created = manager
            .find_container(&mut ctx, "sidebar", &page, None)
            .unwrap()
            .unwrap();
        assert_eq!(created, BlockId::new(12).unwrap());

        // the new root is visible in the same resolution
        let current = ctx.page(page.id()).unwrap();
        assert_eq!(current.root_block_ids().last(), Some(&created));

        let nested = manager
            .find_container(&mut ctx, "aside", &page, Some(&BlockId::new(10).unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(nested, BlockId::new(13).unwrap());
        created
    };

    let stored = SqliteRepository::new_with_path(&path)
        .unwrap()
        .find_by_id(&PageId::new(1).unwrap())
        .unwrap()
        .unwrap();
    let sidebar = stored.find_container("sidebar", None).unwrap();
    assert_eq!(sidebar.id(), &created);
    assert!(sidebar.is_root());
    let aside = stored
        .find_container("aside", Some(&BlockId::new(10).unwrap()))
        .unwrap();
    assert_eq!(aside.parent_id(), Some(&BlockId::new(10).unwrap()));

    // a later request finds the container instead of creating another one
    let last = repo.last_block_id().unwrap();
    let manager = CmsPageManager::new(&mut repo, SequentialBlockInteractor::starting_after(last));
    let mut ctx = ResolutionContext::new();
    let page = manager.get_page_by_id(&mut ctx, PageId::new(1).unwrap()).unwrap();
    let found = manager.find_container(&mut ctx, "sidebar", &page, None).unwrap();
    assert_eq!(found, Some(created));
}

#[tokio::test]
async fn test_unknown_parent_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cms.sqlite");
    prepare_database(&path).await;

    let mut repo = SqliteRepository::new_with_path(&path).unwrap();
    let manager = CmsPageManager::new(&mut repo, SequentialBlockInteractor::starting_after(None));
    let mut ctx = ResolutionContext::new();
    let page = manager.get_page_by_id(&mut ctx, PageId::new(1).unwrap()).unwrap();

    let err = manager
        .find_container(&mut ctx, "aside", &page, Some(&BlockId::new(999).unwrap()))
        .unwrap_err();
    assert!(matches!(err, CmsError::BlockNotFound(id) if id.value() == 999));
}

#[tokio::test]
async fn test_disabled_page_is_hidden_from_preview() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cms.sqlite");
    prepare_database(&path).await;

    let mut repo = SqliteRepository::new_with_path(&path).unwrap();
    let mut page = repo.find_by_id(&PageId::new(1).unwrap()).unwrap().unwrap();
    page.meta_mut().set_enabled(false);
    repo.save(page).unwrap();

    let manager = CmsPageManager::new(&mut repo, SequentialBlockInteractor::starting_after(None));
    let mut ctx = ResolutionContext::new();
    let err = manager.get_page_by_url(&mut ctx, None, "/").unwrap_err();
    assert!(matches!(err, CmsError::PageNotFound(_)));
}

#[tokio::test]
async fn test_selector_switches_between_public_and_preview() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cms.sqlite");
    prepare_database(&path).await;

    let public_repo = SqliteRepository::new_with_path(&path).unwrap();
    let mut preview_repo = SqliteRepository::new_with_path(&path).unwrap();
    let interactor = SequentialBlockInteractor::starting_after(preview_repo.last_block_id().unwrap());

    let selector = CmsManagerSelector::new(
        Box::new(CmsSnapshotManager::new(&public_repo)),
        Box::new(CmsPageManager::new(&mut preview_repo, interactor)),
    );

    let mut public_ctx = ResolutionContext::new();
    let public = selector.retrieve(ServingMode::Public);
    let page = public.get_page_by_url(&mut public_ctx, Some(&site()), "/").unwrap();
    assert!(page.is_snapshot());
    assert_eq!(text_of(public, &mut public_ctx), "Published");

    let mut preview_ctx = ResolutionContext::new();
    let preview = selector.retrieve(ServingMode::Preview);
    let page = preview.get_page_by_url(&mut preview_ctx, Some(&site()), "/").unwrap();
    assert!(!page.is_snapshot());
    assert_eq!(text_of(preview, &mut preview_ctx), "Draft");

    // a container created while previewing stays out of the published page
    let preview = selector.retrieve(ServingMode::Preview);
    assert!(preview
        .find_container(&mut preview_ctx, "banner", &page, None)
        .unwrap()
        .is_some());

    let public = selector.retrieve(ServingMode::default());
    let mut public_ctx = ResolutionContext::new();
    let page = public.get_page_by_url(&mut public_ctx, None, "/").unwrap();
    assert_eq!(public.find_container(&mut public_ctx, "banner", &page, None).unwrap(), None);

    // a context that served public pages cannot be reused for a preview
    let err = preview
        .get_page_by_url(&mut public_ctx, Some(&site()), "/")
        .unwrap_err();
    assert!(matches!(
        err,
        CmsError::SourceMismatch { bound: SourceKind::Snapshot, requested: SourceKind::Live }
    ));
    let err = preview
        .find_container(&mut public_ctx, "banner", &page, None)
        .unwrap_err();
    assert!(matches!(err, CmsError::SourceMismatch { .. }));
    assert_eq!(text_of(public, &mut public_ctx), "Published");
}
