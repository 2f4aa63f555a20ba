//! Cuthill-McKee node renumbering for bandwidth reduction.
//!
//! The mesh graph treats each triangle as a clique of its three nodes.
//! Numbering starts from a lowest-degree seed per connected component
//! and visits neighbors in increasing degree order.

use crate::mesh::{Element, Mesh, Node};
use std::collections::VecDeque;

/// Compute the new-number permutation `newnum[old] = new`.
pub fn cuthill_mckee(num_nodes: usize, elements: &[Element]) -> Vec<usize> {
    let adjacency = build_adjacency(num_nodes, elements);
    let degree: Vec<usize> = adjacency.iter().map(|a| a.len()).collect();

    let mut newnum = vec![usize::MAX; num_nodes];
    let mut next = 0usize;
    let mut queue = VecDeque::new();
    let mut scratch: Vec<usize> = Vec::new();

    loop {
        // lowest-degree unnumbered node seeds the next component
        let seed = (0..num_nodes)
            .filter(|&i| newnum[i] == usize::MAX)
            .min_by_key(|&i| degree[i]);
        let Some(seed) = seed else { break };
        newnum[seed] = next;
        next += 1;
        queue.push_back(seed);

        while let Some(u) = queue.pop_front() {
            scratch.clear();
            scratch.extend(
                adjacency[u]
                    .iter()
                    .copied()
                    .filter(|&w| newnum[w] == usize::MAX),
            );
            scratch.sort_by_key(|&w| degree[w]);
            for &w in &scratch {
                if newnum[w] == usize::MAX {
                    newnum[w] = next;
                    next += 1;
                    queue.push_back(w);
                }
            }
        }
    }
    newnum
}

fn build_adjacency(num_nodes: usize, elements: &[Element]) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); num_nodes];
    for el in elements {
        for j in 0..3 {
            let a = el.p[j];
            let b = el.p[(j + 1) % 3];
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
    }
    for list in &mut adjacency {
        list.sort_unstable();
        list.dedup();
    }
    adjacency
}

/// Matrix bandwidth implied by a numbering.
pub fn bandwidth(elements: &[Element], numbering: &[usize]) -> usize {
    let mut band = 0;
    for el in elements {
        for j in 0..3 {
            let a = numbering[el.p[j]];
            let b = numbering[el.p[(j + 1) % 3]];
            band = band.max(a.abs_diff(b));
        }
    }
    band
}

/// Reorder the node array to the numbering in `newnum`, in place by
/// cycle rotation. Consumes `newnum` (it ends as the identity). The
/// optional previous-solution vector rides along with the nodes.
pub fn sort_nodes(newnum: &mut [usize], nodes: &mut [Node], mut tprev: Option<&mut [f64]>) {
    for i in 0..nodes.len() {
        while newnum[i] != i {
            let j = newnum[i];
            newnum[i] = newnum[j];
            newnum[j] = j;
            nodes.swap(i, j);
            if let Some(t) = tprev.as_deref_mut() {
                t.swap(i, j);
            }
        }
    }
}

/// Renumber the whole mesh: remap element and PBC node indices, then
/// sort the node array (and `tprev`, if present) to match.
pub fn renumber(mesh: &mut Mesh, tprev: Option<&mut [f64]>) {
    let mut newnum = cuthill_mckee(mesh.nodes.len(), &mesh.elements);
    let before = bandwidth(&mesh.elements, &(0..mesh.nodes.len()).collect::<Vec<_>>());
    let after = bandwidth(&mesh.elements, &newnum);
    tracing::debug!(before, after, "Cuthill-McKee bandwidth");

    for el in &mut mesh.elements {
        for p in &mut el.p {
            *p = newnum[*p];
        }
    }
    for pbc in &mut mesh.pbcs {
        pbc.a = newnum[pbc.a];
        pbc.b = newnum[pbc.b];
    }
    sort_nodes(&mut newnum, &mut mesh.nodes, tprev);
}
