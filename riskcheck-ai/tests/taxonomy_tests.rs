//! Reference data loading from files on disk

use riskcheck_ai::screener::{screen, ScreenerConfig};
use riskcheck_ai::taxonomy::{ReferenceData, ReferencePaths};
use riskcheck_ai::types::Grade;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_source_without_marker_has_tags_but_no_sub_tags() {
    let dir = TempDir::new().unwrap();
    let taxonomy = write(
        dir.path(),
        "tags.csv",
        "タグ1,定義,リスク\n差別表現,人種や性別に基づく差別,2\n人種差別,人種に基づく偏見,1\n",
    );

    let data = ReferenceData::load(&ReferencePaths {
        taxonomy: Some(taxonomy),
        ..ReferencePaths::default()
    });

    assert_eq!(data.taxonomy.tags().len(), 2);
    assert!(data.taxonomy.find_tag("差別表現").is_some());
    assert_eq!(data.taxonomy.sub_tag_count(), 0);
}

#[test]
fn test_all_sources_load_and_feed_the_screener() {
    let dir = TempDir::new().unwrap();
    let paths = ReferencePaths {
        taxonomy: Some(write(
            dir.path(),
            "tags.csv",
            "tag,definition,risk\n誇大広告,No.1 / 最高,2\n,,\n誇大広告,定義,\n最上級表現,業界最高,1\n",
        )),
        incidents: Some(write(
            dir.path(),
            "incidents.csv",
            "発火要因,タグ１,細分化タグ\n女は家事だけしていればいい,ジェンダー表現,性別役割\n",
        )),
        legal: Some(write(dir.path(), "legal.txt", "景品表示法 第5条 優良誤認表示の禁止")),
        social_cases: None,
    };

    let data = ReferenceData::load(&paths);
    assert_eq!(data.incidents.len(), 1);
    assert_eq!(data.taxonomy.risk_weight("最上級表現"), Some(1));
    assert!(data.legal_corpus.contains("景品表示法"));
    assert!(data.digests.incidents.contains("女は家事だけしていればいい"));
    assert!(data.digests.social_cases.contains("not configured"));

    let candidates = screen(&data, "業界最高の品質", "", &ScreenerConfig::default());
    let tag = candidates.iter().find(|t| t.name == "誇大広告").unwrap();
    // Tag weight 2 grades D; the weight-1 sub-tag grades E
    assert_eq!(tag.grade, Grade::D);
    let sub = tag
        .related_sub_tags
        .iter()
        .find(|s| s.name == "最上級表現")
        .unwrap();
    assert_eq!(sub.grade, Grade::E);
}

#[test]
fn test_missing_sources_degrade_to_empty() {
    let dir = TempDir::new().unwrap();
    let data = ReferenceData::load(&ReferencePaths {
        taxonomy: Some(dir.path().join("absent.csv")),
        incidents: Some(dir.path().join("absent_incidents.csv")),
        legal: Some(dir.path().join("absent.txt")),
        social_cases: None,
    });
    assert!(data.taxonomy.is_empty());
    assert!(data.incidents.is_empty());
    assert!(data.digests.tag_list.contains("not found"));
    assert!(screen(&data, "anything", "", &ScreenerConfig::default()).is_empty());
}
