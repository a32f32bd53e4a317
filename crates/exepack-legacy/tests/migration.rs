use std::path::Path;

use exepack_core::{IdGenerator, is_generated_id};
use exepack_fs::{LocalStorage, Storage};
use exepack_legacy::{CASE_STUDY, MigrationOptions, TEXT, import_legacy, is_legacy, migrate};
use tempfile::tempdir;

fn package(idevices: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<instance xmlns="http://www.exelearning.org/content/v0.3" class="exe.engine.package.Package" reference="1"><dictionary>
<string role="key" value="_title"/><unicode value="Case studies"/>
<string role="key" value="_root"/>
<instance class="exe.engine.node.Node" reference="2"><dictionary>
<string role="key" value="_title"/><unicode value="Home"/>
<string role="key" value="idevices"/><list>{idevices}</list>
</dictionary></instance>
</dictionary></instance>"#
    )
}

const CASE_STUDY_WITH_TWO_IMAGES: &str = r#"
<instance class="exe.engine.casestudyidevice.CaseStudyIdevice" reference="10"><dictionary>
<string role="key" value="_title"/><unicode value="River delta"/>
<string role="key" value="storyTextArea"/>
<instance class="exe.engine.field.TextAreaField" reference="11"><dictionary>
<string role="key" value="content_w_resourcePaths"/>
<unicode content="true" value="&lt;p&gt;Before &lt;img src=&quot;resources/img1.png&quot; /&gt; and after &lt;img src=&quot;resources/img2.png&quot; /&gt;&lt;/p&gt;"/>
</dictionary></instance>
<string role="key" value="questions"/><list>
<instance class="exe.engine.casestudyidevice.Question" reference="12"><dictionary>
<string role="key" value="questionTextArea"/>
<instance class="exe.engine.field.TextAreaField" reference="13"><dictionary>
<string role="key" value="content"/><unicode value="&lt;p&gt;Where does it flow?&lt;/p&gt;"/>
</dictionary></instance>
</dictionary></instance>
</list>
</dictionary></instance>"#;

#[test]
fn case_study_history_with_two_images() {
    let xml = package(CASE_STUDY_WITH_TWO_IMAGES);
    let migration = migrate(xml.as_bytes(), &MigrationOptions::default(), &mut IdGenerator::new()).unwrap();

    assert_eq!(migration.graph.unit_count(), 1);
    let unit = migration.graph.units().next().unwrap();
    assert_eq!(unit.kind, CASE_STUDY);
    assert!(is_generated_id(unit.id.as_str()));

    let history = unit.text("history");
    assert!(history.contains(&format!("content/resources/{}/img1.png", unit.id)), "{history}");
    assert!(history.contains(&format!("content/resources/{}/img2.png", unit.id)), "{history}");
    assert_eq!(unit.html, history);
    assert_eq!(
        migration.report.referenced_paths(),
        ["resources/img1.png", "resources/img2.png"]
    );

    let activities = unit.properties["activities"].as_array().unwrap();
    assert_eq!(activities[0]["activity"], "<p>Where does it flow?</p>");
    assert_eq!(activities[0]["feedback"], "");
    let warnings: Vec<_> = migration.report.warnings.iter().map(|w| w.message.as_str()).collect();
    assert_eq!(warnings, ["field 'activities[0].feedback' missing, left empty"]);
}

#[test]
fn generic_idevice_reads_its_field_list() {
    let objectives = r#"
<instance class="exe.engine.idevice.GenericIdevice" reference="40"><dictionary>
<string role="key" value="_title"/><unicode value="Objectives"/>
<string role="key" value="fields"/><list>
<instance class="exe.engine.field.TextAreaField" reference="41"><dictionary>
<string role="key" value="content_w_resourcePaths"/><unicode value="&lt;p&gt;Learn rivers &lt;img src=&quot;resources/map.png&quot; /&gt;&lt;/p&gt;"/>
</dictionary></instance>
<instance class="exe.engine.field.TextAreaField" reference="42"><dictionary>
<string role="key" value="content"/><unicode value="&lt;p&gt;Name three deltas&lt;/p&gt;"/>
</dictionary></instance>
</list>
</dictionary></instance>"#;
    let xml = package(objectives);
    let migration = migrate(xml.as_bytes(), &MigrationOptions::default(), &mut IdGenerator::new()).unwrap();

    let unit = migration.graph.units().next().unwrap();
    assert_eq!(unit.kind, TEXT);
    assert!(unit.html.contains("Learn rivers"), "{}", unit.html);
    assert!(unit.html.contains("Name three deltas"), "{}", unit.html);
    assert!(unit.html.contains(&format!("content/resources/{}/map.png", unit.id)));
    assert!(migration.report.warnings.is_empty(), "{:?}", migration.report.warnings);
}

#[test]
fn missing_field_degrades_and_later_units_continue() {
    let broken = r#"
<instance class="exe.engine.freetextidevice.FreeTextIdevice" reference="20"><dictionary>
<string role="key" value="_title"/><unicode value="Empty"/>
</dictionary></instance>
<instance class="exe.engine.flashidevice.FlashIdevice" reference="21"><dictionary>
<string role="key" value="width"/><int value="300"/>
</dictionary></instance>"#;
    let ok = r#"
<instance class="exe.engine.freetextidevice.FreeTextIdevice" reference="30"><dictionary>
<string role="key" value="content"/>
<instance class="exe.engine.field.TextAreaField" reference="31"><dictionary>
<string role="key" value="content"/><unicode value="&lt;p&gt;still here&lt;/p&gt;"/>
</dictionary></instance>
</dictionary></instance>"#;
    let xml = package(&format!("{broken}{ok}"));
    let migration = migrate(xml.as_bytes(), &MigrationOptions::default(), &mut IdGenerator::new()).unwrap();

    let units: Vec<_> = migration.graph.units().collect();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].kind, TEXT);
    assert_eq!(units[0].text("textTextarea"), "");
    assert!(units[0].properties.contains_key("textTextarea"));
    assert_eq!(units[1].html, "<p>still here</p>");

    let report = &migration.report;
    assert_eq!(report.units, 2);
    assert_eq!(report.skipped, 1);
    assert!(report.warnings.iter().any(|w| w.message.contains("textTextarea")));
    assert!(report.warnings.iter().any(|w| w.context == "FlashIdevice"));

    // Legacy order survives as block order.
    let page = migration.graph.roots()[0].id.clone();
    let blocks = migration.graph.blocks_of(&page);
    assert_eq!(blocks[0].title, "Empty");
    assert_eq!(blocks[1].order, 2);
}

#[test]
fn import_stages_resources_and_records_missing() {
    let dir = tempdir().unwrap();
    let raw = LocalStorage::new(dir.path().join("raw"));
    let resources = LocalStorage::new(dir.path().join("resources"));
    raw.write(Path::new("contentv3.xml"), package(CASE_STUDY_WITH_TWO_IMAGES).as_bytes())
        .unwrap();
    raw.write(Path::new("img1.png"), b"one").unwrap();
    assert!(is_legacy(&raw));

    let migration = import_legacy(&raw, &resources, &MigrationOptions::default(), &mut IdGenerator::new())
        .unwrap();
    let unit = migration.graph.units().next().unwrap();
    let staged = Path::new(unit.id.as_str()).join("img1.png");
    assert_eq!(resources.read_to_string(&staged).unwrap(), "one");
    assert_eq!(migration.report.missing.len(), 1);
    assert_eq!(migration.report.missing[0].original, "resources/img2.png");
}

#[test]
fn import_without_document_is_not_found() {
    let dir = tempdir().unwrap();
    let raw = LocalStorage::new(dir.path());
    let err = import_legacy(&raw, &raw, &MigrationOptions::default(), &mut IdGenerator::new()).unwrap_err();
    assert!(err.is_not_found());
    assert!(!is_legacy(&raw));
}

#[test]
fn windows_1252_document_is_transcoded_and_escaped() {
    let mut bytes = br#"<?xml version="1.0" encoding="windows-1252"?>
<instance class="exe.engine.package.Package" reference="1"><dictionary>
<string role="key" value="_title"/><unicode value="Espa"#
        .to_vec();
    bytes.push(0xF1);
    bytes.extend_from_slice(
        br#"ol"/>
<string role="key" value="_root"/>
<instance class="exe.engine.node.Node" reference="2"><dictionary>
<string role="key" value="idevices"/><list>
<instance class="exe.engine.galleryidevice.ImageGalleryIdevice" reference="3"><dictionary>
<string role="key" value="images"/><list>
<instance class="exe.engine.galleryidevice.GalleryImage" reference="4"><dictionary>
<string role="key" value="_caption"/><unicode value="a &lt; b"/>
<string role="key" value="_imageResource"/>
<instance class="exe.engine.resource.Resource" reference="5"><dictionary>
<string role="key" value="_storageName"/><unicode value="pic.jpg"/>
</dictionary></instance>
</dictionary></instance>
</list>
</dictionary></instance>
</list>
</dictionary></instance>
</dictionary></instance>"#,
    );

    let migration = migrate(&bytes, &MigrationOptions::default(), &mut IdGenerator::new()).unwrap();
    assert_eq!(migration.graph.meta.title, "Español");
    assert_eq!(migration.report.encoding, "windows-1252");

    let unit = migration.graph.units().next().unwrap();
    let image = &unit.properties["images"][0];
    assert_eq!(image["caption"], "a &lt; b");
    assert_eq!(image["src"], format!("content/resources/{}/pic.jpg", unit.id));
    assert!(unit.html.contains("<figcaption>a &lt; b</figcaption>"));
    assert_eq!(migration.report.referenced_paths(), ["resources/pic.jpg"]);
}
