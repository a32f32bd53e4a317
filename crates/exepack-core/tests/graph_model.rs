use std::collections::HashSet;

use exepack_core::{
    BlockNode, ContentUnit, IdGenerator, ObjectGraph, PageNode, ProjectMeta, RewriteMode,
    rewrite_html,
};

/// Build a small graph the way the migrator does: fresh ids from one set,
/// rewritten unit HTML, legacy ordering kept.
#[test]
fn build_graph_with_generated_ids() {
    let mut ids = HashSet::new();
    let mut generator = IdGenerator::seeded(3);
    let mut graph = ObjectGraph::new(ProjectMeta {
        title: "Rivers".into(),
        resource_base: "content/resources".into(),
        ..ProjectMeta::default()
    });

    let page = generator.generate_into(&mut ids);
    graph.add_page(PageNode::new(page.clone(), "Home")).unwrap();

    for (order, source) in ["<img src=\"resources/a.png\">", "<p>plain</p>"].into_iter().enumerate() {
        let block = generator.generate_into(&mut ids);
        let unit = generator.generate_into(&mut ids);
        let rewritten = rewrite_html(source, "content/resources", unit.as_str(), RewriteMode::Session);
        graph
            .add_block(BlockNode::new(block.clone(), page.clone(), "text").with_order(order as i64))
            .unwrap();
        graph
            .add_unit(ContentUnit::new(unit, block, "text").with_html(rewritten.html))
            .unwrap();
    }

    assert_eq!(graph.ids(), ids);
    let blocks = graph.blocks_of(&page);
    assert_eq!(blocks.len(), 2);
    let first = graph.units_of(&blocks[0].id)[0];
    assert_eq!(
        first.html,
        format!("<img src=\"content/resources/{}/a.png\">", first.id)
    );
}
