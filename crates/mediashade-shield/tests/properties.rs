//! Whole-document properties of the concealment engine

use std::rc::Rc;

use mediashade_core::{MemoryStore, ShieldConfig};
use mediashade_dom::Document;
use mediashade_shield::{ConcealEngine, MediaShield};

const MARKER: &str = "good-old-twitter-hidden";

const FEED: &str = r#"<!DOCTYPE html>
<html><body>
<main>
  <article id="post-1" data-testid="tweet">
    <div data-testid="Tweet-User-Avatar">
      <div data-testid="UserAvatar-Container-alice">
        <img id="avatar-1" src="https://pbs.twimg.com/profile_images/1/alice.jpg" width="40" height="40">
      </div>
    </div>
    <div data-testid="tweetText">a photo <img id="emoji-1" alt="emoji smiley" src="https://abs.twimg.com/emoji/1f600.svg" width="16" height="16"></div>
    <div id="media-wrap-1" class="css-1 r-photo">
      <div id="photo-1" data-testid="tweetPhoto">
        <img id="media-1" src="https://pbs.twimg.com/media/one.jpg" width="600" height="400">
      </div>
    </div>
  </article>
  <article id="post-2" data-testid="tweet">
    <div data-testid="Tweet-User-Avatar"><img id="avatar-2" src="https://pbs.twimg.com/profile_images/2/bob.jpg"></div>
    <div data-testid="card.wrapper"><div data-testid="card.layoutLarge.media"><img id="card-img" src="https://cdn.example.com/card.jpg" width="500" height="260"></div></div>
    <div data-testid="videoPlayer"><video id="video-2"></video></div>
  </article>
  <nav><div data-testid="SideNav_AccountSwitcher_Button"><img id="me" src="https://pbs.twimg.com/profile_images/3/me.jpg" width="32" height="32"></div></nav>
</main>
</body></html>"#;

fn hidden(doc: &Document, id: &str) -> bool {
    doc.get_element_by_id(id)
        .unwrap_or_else(|| panic!("missing #{id}"))
        .has_class(MARKER)
}

fn engine() -> ConcealEngine {
    ConcealEngine::new(&ShieldConfig::default())
}

fn assert_zones_clean(doc: &Document, engine: &ConcealEngine) {
    for el in engine.marker().marked_in(doc.root()) {
        assert!(
            !engine.classifier().is_protected(&el),
            "marked element inside a protected zone: {}",
            el.outer_html()
        );
    }
}

fn full_pass(doc: &Document, engine: &ConcealEngine) {
    engine.sweep(doc.root());
    engine.repair(doc.root());
}

#[test]
fn avatar_and_article_scenario() {
    let doc = Document::parse_html(FEED).unwrap();
    let engine = engine();
    full_pass(&doc, &engine);

    for avatar in ["avatar-1", "avatar-2", "me"] {
        assert!(!hidden(&doc, avatar), "{avatar} must stay visible");
    }
    assert!(hidden(&doc, "media-1"));
    assert!(hidden(&doc, "photo-1"));
    assert!(hidden(&doc, "media-wrap-1"));
    assert!(hidden(&doc, "card-img"));
    assert!(hidden(&doc, "video-2"));
    assert_zones_clean(&doc, &engine);
}

#[test]
fn shallow_page_keeps_avatar_and_page_roots_visible() {
    let doc = Document::parse_html(
        r#"<div id="zone" data-testid="Tweet-User-Avatar"><img id="avatar" src="https://pbs.twimg.com/profile_images/1/profile.jpg" width="48" height="48"></div>
           <article id="art"><img id="pic" src="https://twimg.com/photo.jpg" width="400" height="300"></article>"#,
    )
    .unwrap();
    let engine = engine();
    full_pass(&doc, &engine);
    engine.sweep_aggressive(doc.root());
    engine.repair(doc.root());

    assert!(hidden(&doc, "pic"));
    assert!(hidden(&doc, "art"));
    assert!(!hidden(&doc, "avatar"));
    assert!(!doc.body().unwrap().has_class(MARKER));
    assert!(!doc.document_element().unwrap().has_class(MARKER));

    let zone = doc.get_element_by_id("zone").unwrap();
    for ancestor in zone.ancestors() {
        assert!(
            !ancestor.has_class(MARKER),
            "avatar zone hidden through {}",
            ancestor.tag_name().unwrap_or("#document")
        );
    }
}

#[test]
fn emoji_is_never_marked() {
    let doc = Document::parse_html(FEED).unwrap();
    let engine = engine();
    full_pass(&doc, &engine);
    engine.sweep_aggressive(doc.root());
    engine.repair(doc.root());

    assert!(!hidden(&doc, "emoji-1"));
}

#[test]
fn protected_ancestor_stops_everything() {
    let doc = Document::parse_html(
        r#"<div id="zone" data-testid="UserAvatar-Container-x">
             <div class="media"><div class="media"><div class="media">
               <img id="img" src="https://pbs.twimg.com/media/a.jpg" width="400" height="400">
             </div></div></div>
           </div>"#,
    )
    .unwrap();
    let engine = engine();

    let img = doc.get_element_by_id("img").unwrap();
    assert_eq!(engine.conceal(&img).total(), 0);
    full_pass(&doc, &engine);
    engine.sweep_aggressive(doc.root());

    let zone = doc.get_element_by_id("zone").unwrap();
    assert!(engine.marker().marked_in(&zone).is_empty());
}

#[test]
fn repair_restores_zone_invariant() {
    let doc = Document::parse_html(FEED).unwrap();
    let engine = engine();

    // worst case: everything marked
    for el in doc.root().descendants() {
        if el.is_element() {
            el.add_class(MARKER);
        }
    }
    assert!(engine.repair(doc.root()) > 0);
    assert_zones_clean(&doc, &engine);
    assert!(hidden(&doc, "media-1"));

    let html = doc.to_html();
    assert_eq!(engine.repair(doc.root()), 0);
    assert_eq!(doc.to_html(), html);
}

#[test]
fn conceal_then_conceal_again_changes_nothing() {
    let doc = Document::parse_html(FEED).unwrap();
    let engine = engine();
    full_pass(&doc, &engine);
    let html = doc.to_html();

    for el in engine.marker().marked_in(doc.root()) {
        assert_eq!(engine.conceal(&el).total(), 0);
    }
    full_pass(&doc, &engine);
    assert_eq!(doc.to_html(), html);
}

#[tokio::test]
async fn toggle_round_trip_matches_fresh_pass() {
    let fresh = Document::parse_html(FEED).unwrap();
    full_pass(&fresh, &engine());
    let expected = fresh.to_html();

    let doc = Rc::new(Document::parse_html(FEED).unwrap());
    let mut shield = MediaShield::init(
        doc.clone(),
        ShieldConfig::default(),
        MemoryStore::new(),
        MemoryStore::new(),
    )
    .await
    .unwrap();
    assert_eq!(doc.to_html(), expected);

    assert!(!shield.toggle().await);
    assert!(shield.engine().marker().marked_in(doc.root()).is_empty());

    assert!(shield.toggle().await);
    assert_eq!(doc.to_html(), expected);
}
