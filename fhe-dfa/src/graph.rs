//! DFA intermediate representation.
//!
//! A [`Graph`] is a complete deterministic automaton over the binary
//! alphabet: every state has exactly two successors, selected by the
//! current input bit. Automata over 2^k symbols are expressed at the bit
//! level, k consecutive bits per symbol, least-significant bit first.
//!
//! The structure is immutable once built; derived data (reversed
//! adjacency, distance to the final set, states reachable at each depth)
//! is computed on demand and cached.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{Error, Result};

pub type State = usize;

#[derive(Clone, Debug)]
pub struct Graph {
    next: Vec<[State; 2]>,
    init: State,
    finals: Vec<bool>,
    predecessors: OnceLock<Vec<[Vec<State>; 2]>>,
    final_distance: OnceLock<Vec<Option<usize>>>,
    depth_table: Option<Vec<Vec<State>>>,
}

impl Graph {
    /// Builds a graph from its raw transition table.
    ///
    /// `next[v] = [child0, child1]`, `finals[v]` marks accepting states.
    pub fn new(next: Vec<[State; 2]>, init: State, finals: Vec<bool>) -> Result<Self> {
        let n = next.len();
        if n == 0 {
            return Err(Error::BadSpec("automaton has no states".into()));
        }
        if finals.len() != n {
            return Err(Error::BadSpec(format!(
                "final marker count {} does not match state count {n}",
                finals.len()
            )));
        }
        if init >= n {
            return Err(Error::BadSpec(format!(
                "initial state {init} out of range (|V| = {n})"
            )));
        }
        for (v, children) in next.iter().enumerate() {
            for &c in children {
                if c >= n {
                    return Err(Error::BadSpec(format!(
                        "state {v} has successor {c} out of range (|V| = {n})"
                    )));
                }
            }
        }
        Ok(Self {
            next,
            init,
            finals,
            predecessors: OnceLock::new(),
            final_distance: OnceLock::new(),
            depth_table: None,
        })
    }

    /// Loads a graph from a textual spec file.
    pub fn from_spec(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_spec_text(&text)
    }

    /// Parses the textual spec format:
    /// a header `|V| q0 #finals`, then `#finals` final state ids, then
    /// one line `v c0 c1` per state. Tokens are whitespace-separated;
    /// line boundaries are not significant.
    pub fn from_spec_text(text: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace().map(|tok| {
            tok.parse::<usize>()
                .map_err(|_| Error::BadSpec(format!("invalid token {tok:?}")))
        });
        let mut take = |what: &str| -> Result<usize> {
            tokens
                .next()
                .ok_or_else(|| Error::BadSpec(format!("unexpected end of spec, missing {what}")))?
        };

        let n = take("state count")?;
        let init = take("initial state")?;
        let final_count = take("final count")?;
        if n == 0 {
            return Err(Error::BadSpec("automaton has no states".into()));
        }
        if final_count > n {
            return Err(Error::BadSpec(format!(
                "{final_count} final states declared but |V| = {n}"
            )));
        }

        let mut finals = vec![false; n];
        for _ in 0..final_count {
            let f = take("final state id")?;
            if f >= n {
                return Err(Error::BadSpec(format!(
                    "final state {f} out of range (|V| = {n})"
                )));
            }
            if finals[f] {
                return Err(Error::BadSpec(format!("duplicate final state {f}")));
            }
            finals[f] = true;
        }

        let mut next: Vec<Option<[State; 2]>> = vec![None; n];
        for _ in 0..n {
            let v = take("state id")?;
            let c0 = take("0-successor")?;
            let c1 = take("1-successor")?;
            if v >= n {
                return Err(Error::BadSpec(format!(
                    "state {v} out of range (|V| = {n})"
                )));
            }
            if next[v].is_some() {
                return Err(Error::BadSpec(format!("duplicate state {v}")));
            }
            next[v] = Some([c0, c1]);
        }
        if tokens.next().transpose()?.is_some() {
            return Err(Error::BadSpec("trailing tokens after transition table".into()));
        }

        let next = next
            .into_iter()
            .enumerate()
            .map(|(v, row)| row.ok_or_else(|| Error::BadSpec(format!("state {v} is missing"))))
            .collect::<Result<Vec<_>>>()?;
        Self::new(next, init, finals)
    }

    pub fn state_count(&self) -> usize {
        self.next.len()
    }

    pub fn initial_state(&self) -> State {
        self.init
    }

    pub fn is_final(&self, state: State) -> bool {
        self.finals[state]
    }

    pub fn final_states(&self) -> impl Iterator<Item = State> + '_ {
        (0..self.state_count()).filter(|&v| self.finals[v])
    }

    pub fn transition(&self, state: State, bit: bool) -> State {
        self.next[state][bit as usize]
    }

    /// Runs the automaton from `state` over `bits`, first bit first.
    pub fn step_word(&self, state: State, bits: impl IntoIterator<Item = bool>) -> State {
        bits.into_iter()
            .fold(state, |s, bit| self.transition(s, bit))
    }

    /// Plaintext acceptance of a bit string.
    pub fn accept(&self, bits: impl IntoIterator<Item = bool>) -> bool {
        self.finals[self.step_word(self.init, bits)]
    }

    /// Predecessor lists per target state and input bit, cached.
    pub fn predecessors(&self) -> &[[Vec<State>; 2]] {
        self.predecessors.get_or_init(|| {
            let mut pred = vec![[Vec::new(), Vec::new()]; self.state_count()];
            for (v, children) in self.next.iter().enumerate() {
                for (bit, &c) in children.iter().enumerate() {
                    pred[c][bit].push(v);
                }
            }
            pred
        })
    }

    /// Shortest distance from each state to the final set, cached.
    /// `None` marks states from which no final state is reachable.
    pub fn final_distances(&self) -> &[Option<usize>] {
        self.final_distance.get_or_init(|| {
            let mut dist = vec![None; self.state_count()];
            let mut queue: VecDeque<State> = VecDeque::new();
            for v in 0..self.state_count() {
                if self.finals[v] {
                    dist[v] = Some(0);
                    queue.push_back(v);
                }
            }
            while let Some(v) = queue.pop_front() {
                let d = dist[v].unwrap() + 1;
                for preds in self.predecessors()[v].iter() {
                    for &u in preds {
                        if dist[u].is_none() {
                            dist[u] = Some(d);
                            queue.push_back(u);
                        }
                    }
                }
            }
            dist
        })
    }

    /// Precomputes the states reachable after exactly d inputs, for every
    /// d in [0, n]. Used by the offline evaluator once the input length
    /// is known; O(n * |V|).
    pub fn reserve_states_at_depth(&mut self, n: usize) {
        let mut table = Vec::with_capacity(n + 1);
        let mut live = vec![false; self.state_count()];
        live[self.init] = true;
        table.push(vec![self.init]);
        for _ in 0..n {
            let mut next_live = vec![false; self.state_count()];
            for v in 0..self.state_count() {
                if live[v] {
                    next_live[self.next[v][0]] = true;
                    next_live[self.next[v][1]] = true;
                }
            }
            table.push(
                (0..self.state_count())
                    .filter(|&v| next_live[v])
                    .collect(),
            );
            live = next_live;
        }
        self.depth_table = Some(table);
    }

    /// States reachable after exactly `depth` inputs.
    /// [`Self::reserve_states_at_depth`] must have been called with a
    /// bound of at least `depth`.
    pub fn states_at_depth(&self, depth: usize) -> Option<&[State]> {
        self.depth_table
            .as_ref()
            .and_then(|table| table.get(depth))
            .map(Vec::as_slice)
    }

    /// Same language, final set complemented.
    pub fn negated(&self) -> Self {
        Self {
            next: self.next.clone(),
            init: self.init,
            finals: self.finals.iter().map(|&f| !f).collect(),
            predecessors: OnceLock::new(),
            final_distance: OnceLock::new(),
            depth_table: None,
        }
    }

    /// Deterministic automaton of the reversed language: the edge-reversed
    /// graph, determinized by subset construction. The start subset is the
    /// final set; a subset accepts iff it contains the original initial
    /// state.
    pub fn reversed(&self) -> Self {
        let pred = self.predecessors();
        let words = self.state_count().div_ceil(64);
        let subset_key = |subset: &[bool]| -> Vec<u64> {
            let mut key = vec![0u64; words];
            for (v, &present) in subset.iter().enumerate() {
                if present {
                    key[v / 64] |= 1 << (v % 64);
                }
            }
            key
        };

        let start: Vec<bool> = self.finals.clone();
        let mut ids: HashMap<Vec<u64>, State> = HashMap::new();
        let mut subsets: Vec<Vec<bool>> = Vec::new();
        let mut next: Vec<[State; 2]> = Vec::new();
        let mut worklist: VecDeque<State> = VecDeque::new();

        ids.insert(subset_key(&start), 0);
        subsets.push(start);
        next.push([0, 0]);
        worklist.push_back(0);

        while let Some(id) = worklist.pop_front() {
            for bit in 0..2 {
                let source = subsets[id].clone();
                let mut target = vec![false; self.state_count()];
                for (v, &present) in source.iter().enumerate() {
                    if present {
                        for &u in &pred[v][bit] {
                            target[u] = true;
                        }
                    }
                }
                let key = subset_key(&target);
                let target_id = *ids.entry(key).or_insert_with(|| {
                    let fresh = subsets.len();
                    subsets.push(target);
                    next.push([0, 0]);
                    worklist.push_back(fresh);
                    fresh
                });
                next[id][bit] = target_id;
            }
        }

        let finals = subsets.iter().map(|subset| subset[self.init]).collect();
        Self::new(next, 0, finals).expect("subset construction is well formed")
    }

    /// Language-preserving Hopcroft minimization over the partition
    /// (F, V \ F) with the two alphabet symbols as splitters. Unreachable
    /// states are removed first.
    pub fn minimized(&self) -> Self {
        let reachable = self.reachable_restriction();
        let n = reachable.state_count();
        let pred = reachable.predecessors();

        // Partition refinement. `class[v]` is v's block; blocks are kept
        // as member lists and refined until stable.
        let mut class = vec![0usize; n];
        let mut blocks: Vec<Vec<State>> = Vec::new();
        let finals: Vec<State> = (0..n).filter(|&v| reachable.finals[v]).collect();
        let non_finals: Vec<State> = (0..n).filter(|&v| !reachable.finals[v]).collect();
        for members in [finals, non_finals] {
            if members.is_empty() {
                continue;
            }
            let id = blocks.len();
            for &v in &members {
                class[v] = id;
            }
            blocks.push(members);
        }

        let mut worklist: VecDeque<usize> = (0..blocks.len()).collect();
        while let Some(splitter) = worklist.pop_front() {
            // The splitter may itself be split below; refine against a
            // snapshot of its members.
            let splitter_members = blocks[splitter].clone();
            for bit in 0..2 {
                // Preimage of the splitter block under this input bit.
                let mut preimage = vec![false; n];
                for &v in &splitter_members {
                    for &u in &pred[v][bit] {
                        preimage[u] = true;
                    }
                }
                for block_id in 0..blocks.len() {
                    let (inside, outside): (Vec<State>, Vec<State>) = blocks[block_id]
                        .iter()
                        .partition(|&&v| preimage[v]);
                    if inside.is_empty() || outside.is_empty() {
                        continue;
                    }
                    let fresh = blocks.len();
                    let (smaller, larger) = if inside.len() <= outside.len() {
                        (inside, outside)
                    } else {
                        (outside, inside)
                    };
                    for &v in &smaller {
                        class[v] = fresh;
                    }
                    blocks[block_id] = larger;
                    blocks.push(smaller);
                    worklist.push_back(fresh);
                }
            }
        }

        let mut next = vec![[0, 0]; blocks.len()];
        let mut finals = vec![false; blocks.len()];
        for (id, members) in blocks.iter().enumerate() {
            let representative = members[0];
            next[id] = [
                class[reachable.next[representative][0]],
                class[reachable.next[representative][1]],
            ];
            finals[id] = reachable.finals[representative];
        }
        Self::new(next, class[reachable.init], finals).expect("refinement preserves structure")
    }

    /// Restriction to the states reachable from the initial state.
    fn reachable_restriction(&self) -> Self {
        let mut order: Vec<State> = Vec::new();
        let mut renumber = vec![usize::MAX; self.state_count()];
        let mut queue = VecDeque::from([self.init]);
        renumber[self.init] = 0;
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for &c in &self.next[v] {
                if renumber[c] == usize::MAX {
                    renumber[c] = order.len() + queue.len();
                    queue.push_back(c);
                }
            }
        }
        let next = order
            .iter()
            .map(|&v| [renumber[self.next[v][0]], renumber[self.next[v][1]]])
            .collect();
        let finals = order.iter().map(|&v| self.finals[v]).collect();
        Self::new(next, 0, finals).expect("restriction preserves structure")
    }

    /// Serializes back to the textual spec format.
    pub fn dump(&self, out: &mut impl Write) -> std::io::Result<()> {
        let final_count = self.finals.iter().filter(|&&f| f).count();
        writeln!(out, "{} {} {final_count}", self.state_count(), self.init)?;
        for v in self.final_states() {
            writeln!(out, "{v}")?;
        }
        for (v, [c0, c1]) in self.next.iter().enumerate() {
            writeln!(out, "{v} {c0} {c1}")?;
        }
        Ok(())
    }

    /// Serializes to Graphviz DOT. States that cannot reach the final set
    /// are drawn dotted.
    pub fn dump_dot(&self, out: &mut impl Write) -> std::io::Result<()> {
        let dist = self.final_distances();
        let mut text = String::new();
        writeln!(&mut text, "digraph dfa {{").unwrap();
        writeln!(&mut text, "    rankdir = LR;").unwrap();
        writeln!(&mut text, "    start [shape = point];").unwrap();
        for v in 0..self.state_count() {
            let shape = if self.finals[v] { "doublecircle" } else { "circle" };
            let style = if dist[v].is_none() { ", style = dotted" } else { "" };
            writeln!(&mut text, "    q{v} [shape = {shape}{style}];").unwrap();
        }
        writeln!(&mut text, "    start -> q{};", self.init).unwrap();
        for (v, [c0, c1]) in self.next.iter().enumerate() {
            if c0 == c1 {
                writeln!(&mut text, "    q{v} -> q{c0} [label = \"0,1\"];").unwrap();
            } else {
                writeln!(&mut text, "    q{v} -> q{c0} [label = \"0\"];").unwrap();
                writeln!(&mut text, "    q{v} -> q{c1} [label = \"1\"];").unwrap();
            }
        }
        writeln!(&mut text, "}}").unwrap();
        out.write_all(text.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Even number of 1s.
    fn even_ones() -> Graph {
        Graph::new(vec![[0, 1], [1, 0]], 0, vec![true, false]).unwrap()
    }

    /// Strings whose last two bits are 0 then 1.
    fn ends_in_01() -> Graph {
        // 0: last bit not a useful prefix, 1: last bit 0, 2: last two 01.
        Graph::new(vec![[1, 0], [1, 2], [1, 0]], 0, vec![false, false, true]).unwrap()
    }

    fn bits(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == '1').collect()
    }

    /// BFS relabeling from the initial state, for structural comparison
    /// up to state renaming.
    fn canonical(g: &Graph) -> (Vec<[State; 2]>, State, Vec<bool>) {
        let mut renumber = vec![usize::MAX; g.state_count()];
        let mut order = Vec::new();
        let mut queue = VecDeque::from([g.initial_state()]);
        renumber[g.initial_state()] = 0;
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for bit in [false, true] {
                let c = g.transition(v, bit);
                if renumber[c] == usize::MAX {
                    renumber[c] = order.len() + queue.len();
                    queue.push_back(c);
                }
            }
        }
        let next = order
            .iter()
            .map(|&v| [renumber[g.transition(v, false)], renumber[g.transition(v, true)]])
            .collect();
        let finals = order.iter().map(|&v| g.is_final(v)).collect();
        (next, 0, finals)
    }

    fn lcg_bits(seed: &mut u64, len: usize) -> Vec<bool> {
        (0..len)
            .map(|_| {
                *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (*seed >> 63) != 0
            })
            .collect()
    }

    #[test]
    fn parses_spec_text() {
        let g = Graph::from_spec_text("2 0 1\n0\n0 0 1\n1 1 0\n").unwrap();
        assert_eq!(g.state_count(), 2);
        assert_eq!(g.initial_state(), 0);
        assert!(g.is_final(0));
        assert!(!g.is_final(1));
        assert!(g.accept(bits("1011")) == false);
        assert!(g.accept(bits("11")));
    }

    #[test]
    fn rejects_malformed_specs() {
        // Missing vertex line.
        assert!(matches!(
            Graph::from_spec_text("2 0 0\n0 0 1\n"),
            Err(Error::BadSpec(_))
        ));
        // Duplicate vertex.
        assert!(matches!(
            Graph::from_spec_text("2 0 0\n0 0 1\n0 0 1\n"),
            Err(Error::BadSpec(_))
        ));
        // Out-of-range child.
        assert!(matches!(
            Graph::from_spec_text("1 0 0\n0 0 5\n"),
            Err(Error::BadSpec(_))
        ));
        // Initial state out of range.
        assert!(matches!(
            Graph::from_spec_text("1 3 0\n0 0 0\n"),
            Err(Error::BadSpec(_))
        ));
        // Empty automaton.
        assert!(matches!(
            Graph::from_spec_text("0 0 0\n"),
            Err(Error::BadSpec(_))
        ));
        // Garbage token.
        assert!(matches!(
            Graph::from_spec_text("1 0 zero\n0 0 0\n"),
            Err(Error::BadSpec(_))
        ));
        // Trailing tokens.
        assert!(matches!(
            Graph::from_spec_text("1 0 0\n0 0 0\n7\n"),
            Err(Error::BadSpec(_))
        ));
    }

    #[test]
    fn dump_round_trips() {
        let g = ends_in_01();
        let mut buf = Vec::new();
        g.dump(&mut buf).unwrap();
        let parsed = Graph::from_spec_text(std::str::from_utf8(&buf).unwrap()).unwrap();
        assert_eq!(canonical(&g), canonical(&parsed));
    }

    #[test]
    fn dot_output_mentions_every_state() {
        let g = even_ones();
        let mut buf = Vec::new();
        g.dump_dot(&mut buf).unwrap();
        let text = std::str::from_utf8(&buf).unwrap();
        assert!(text.contains("digraph"));
        assert!(text.contains("q0"));
        assert!(text.contains("q1"));
        assert!(text.contains("doublecircle"));
    }

    #[test]
    fn negation_flips_acceptance() {
        let g = ends_in_01();
        let neg = g.negated();
        let mut seed = 7;
        for len in 0..12 {
            let w = lcg_bits(&mut seed, len);
            assert_eq!(g.accept(w.iter().copied()), !neg.accept(w.iter().copied()));
        }
    }

    #[test]
    fn double_reversal_preserves_language() {
        for g in [even_ones(), ends_in_01()] {
            let rr = g.reversed().reversed();
            let mut seed = 13;
            for len in 0..12 {
                let w = lcg_bits(&mut seed, len);
                assert_eq!(g.accept(w.iter().copied()), rr.accept(w.iter().copied()));
            }
        }
    }

    #[test]
    fn reversal_reverses_the_language() {
        let g = ends_in_01();
        let rev = g.reversed();
        let mut seed = 17;
        for len in 0..12 {
            let w = lcg_bits(&mut seed, len);
            let backwards: Vec<bool> = w.iter().rev().copied().collect();
            assert_eq!(g.accept(w.iter().copied()), rev.accept(backwards));
        }
    }

    #[test]
    fn minimization_preserves_language() {
        for g in [even_ones(), ends_in_01(), ends_in_01().reversed()] {
            let m = g.minimized();
            assert!(m.state_count() <= g.state_count());
            let mut seed = 23;
            for len in 0..12 {
                let w = lcg_bits(&mut seed, len);
                assert_eq!(g.accept(w.iter().copied()), m.accept(w.iter().copied()));
            }
        }
    }

    #[test]
    fn minimization_is_idempotent() {
        for g in [even_ones(), ends_in_01(), ends_in_01().reversed()] {
            let once = g.minimized();
            let twice = once.minimized();
            assert_eq!(canonical(&once), canonical(&twice));
        }
    }

    #[test]
    fn minimization_merges_equivalent_finals() {
        // Five states, finals 3 and 4 are equivalent and collapse.
        let g = Graph::new(
            vec![[1, 2], [3, 1], [4, 0], [0, 1], [0, 1]],
            0,
            vec![false, false, false, true, true],
        )
        .unwrap();
        let m = g.minimized();
        assert_eq!(m.state_count(), 4);
        let mut seed = 31;
        for _ in 0..100 {
            let w = lcg_bits(&mut seed, 16);
            assert_eq!(g.accept(w.iter().copied()), m.accept(w.iter().copied()));
        }
    }

    #[test]
    fn minimization_drops_unreachable_states() {
        // State 2 is unreachable from the initial state.
        let g = Graph::new(
            vec![[0, 1], [1, 0], [2, 0]],
            0,
            vec![true, false, true],
        )
        .unwrap();
        let m = g.minimized();
        assert_eq!(m.state_count(), 2);
    }

    #[test]
    fn depth_table_is_bounded_and_rooted() {
        let mut g = ends_in_01();
        g.reserve_states_at_depth(16);
        assert_eq!(g.states_at_depth(0).unwrap(), &[g.initial_state()]);
        for d in 0..=16 {
            let live = g.states_at_depth(d).unwrap();
            assert!(!live.is_empty());
            assert!(live.len() <= g.state_count());
        }
        assert!(g.states_at_depth(17).is_none());
    }

    #[test]
    fn final_distances_follow_edges() {
        let g = ends_in_01();
        let dist = g.final_distances();
        assert_eq!(dist[2], Some(0));
        assert_eq!(dist[1], Some(1));
        assert_eq!(dist[0], Some(2));
    }

    #[test]
    fn single_state_self_loop() {
        let g = Graph::new(vec![[0, 0]], 0, vec![true]).unwrap();
        for len in 0..8 {
            assert!(g.accept(std::iter::repeat(true).take(len)));
        }
    }
}
