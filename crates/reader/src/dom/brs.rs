// ABOUTME: Converts chains of <br> elements into paragraph elements on the document tree.
// ABOUTME: Text following a double break is gathered into a new <p> until the next block.

use ego_tree::{NodeId, Tree};

use super::{is_block_tag, Document, ElementData, Node};

/// Replace every run of two or more `<br>` with a `<p>` holding the inline
/// content that follows it.
///
/// `a<br><br>b<br><br>c` becomes `a<p>b</p><p>c</p>`. A single `<br>` is
/// left alone.
pub fn brs_to_ps(doc: &mut Document) {
    let brs: Vec<NodeId> = doc.elements_named("br").map(|n| n.id()).collect();
    let tree = doc.tree_mut();

    for br in brs {
        // Already consumed as part of an earlier chain.
        if tree.get(br).and_then(|n| n.parent()).is_none() {
            continue;
        }

        let mut replaced = false;
        while let Some(next) = next_significant_sibling(tree, br) {
            if !is_br(tree, next) {
                break;
            }
            replaced = true;
            if let Some(mut node) = tree.get_mut(next) {
                node.detach();
            }
        }
        if !replaced {
            continue;
        }

        let Some(mut br_node) = tree.get_mut(br) else {
            continue;
        };
        let p = br_node
            .insert_before(Node::Element(ElementData::new("p")))
            .id();
        br_node.detach();

        loop {
            let Some(next) = tree.get(p).and_then(|n| n.next_sibling()).map(|n| n.id()) else {
                break;
            };
            if is_br(tree, next) {
                let chain = next_significant_sibling(tree, next).map_or(false, |id| is_br(tree, id));
                if chain {
                    break;
                }
            }
            if !is_phrasing(tree, next) {
                break;
            }
            if let Some(mut p_node) = tree.get_mut(p) {
                p_node.append_id(next);
            }
        }

        trim_trailing_whitespace(tree, p);

        let parent = tree.get(p).and_then(|n| n.parent()).map(|n| n.id());
        if let Some(parent) = parent {
            if let Some(mut parent_node) = tree.get_mut(parent) {
                if let Some(el) = parent_node.value().as_element_mut() {
                    if el.name == "p" {
                        el.name = "div".to_string();
                    }
                }
            }
        }
    }
}

fn is_br(tree: &Tree<Node>, id: NodeId) -> bool {
    tree.get(id).map_or(false, |n| n.value().is_element("br"))
}

fn is_whitespace_text(tree: &Tree<Node>, id: NodeId) -> bool {
    tree.get(id)
        .and_then(|n| n.value().as_text().map(|t| t.trim().is_empty()))
        .unwrap_or(false)
}

fn is_phrasing(tree: &Tree<Node>, id: NodeId) -> bool {
    match tree.get(id).map(|n| n.value()) {
        Some(Node::Text(_)) => true,
        Some(Node::Element(el)) => !is_block_tag(&el.name),
        _ => false,
    }
}

/// The next sibling that is not whitespace-only text.
fn next_significant_sibling(tree: &Tree<Node>, id: NodeId) -> Option<NodeId> {
    let mut current = tree.get(id)?.next_sibling();
    while let Some(node) = current {
        if !is_whitespace_text(tree, node.id()) {
            return Some(node.id());
        }
        current = node.next_sibling();
    }
    None
}

fn trim_trailing_whitespace(tree: &mut Tree<Node>, p: NodeId) {
    loop {
        let last = tree.get(p).and_then(|n| n.last_child()).map(|n| n.id());
        match last {
            Some(last) if is_whitespace_text(tree, last) => {
                if let Some(mut node) = tree.get_mut(last) {
                    node.detach();
                }
            }
            _ => break,
        }
    }
}
