/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Hash a sequence of fields, each length-prefixed so boundaries cannot shift.
pub fn hash_parts(parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// BLAKE3 commitment: H(value || nonce).
pub fn create_commitment(value: &[u8], nonce: &[u8; 32]) -> Hash {
    let mut input = Vec::with_capacity(value.len() + 32);
    input.extend_from_slice(value);
    input.extend_from_slice(nonce);
    hash(&input)
}

/// Verify a BLAKE3 commitment by recomputing H(value || nonce).
pub fn verify_commitment(value: &[u8], nonce: &[u8; 32], commitment: &Hash) -> bool {
    create_commitment(value, nonce) == *commitment
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left);
    combined[32..].copy_from_slice(right);
    hash(&combined)
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|chunk| match chunk {
            [left, right] => hash_pair(left, right),
            // Odd element: hash it with itself
            [single] => hash_pair(single, single),
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Compute the Merkle root of a list of hashes.
/// Returns a zero hash for an empty list and the element itself for a single leaf.
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    match hashes {
        [] => [0u8; 32],
        [single] => *single,
        _ => {
            let mut level = hashes.to_vec();
            while level.len() > 1 {
                level = next_level(&level);
            }
            level[0]
        }
    }
}

/// One step of a Merkle inclusion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MerkleStep {
    pub sibling: Hash,
    /// Whether the sibling sits to the right of the running hash.
    pub sibling_on_right: bool,
}

/// Inclusion path for the leaf at `index`, or `None` when out of range.
pub fn merkle_path(leaves: &[Hash], index: usize) -> Option<Vec<MerkleStep>> {
    if index >= leaves.len() {
        return None;
    }
    let mut path = Vec::new();
    let mut level = leaves.to_vec();
    let mut current = index;

    while level.len() > 1 {
        let sibling_index = current ^ 1;
        let sibling = level.get(sibling_index).copied().unwrap_or(level[current]);
        path.push(MerkleStep {
            sibling,
            sibling_on_right: current % 2 == 0,
        });
        level = next_level(&level);
        current /= 2;
    }

    Some(path)
}

/// Recompute the root from a leaf and its path.
pub fn merkle_root_from_path(leaf: &Hash, path: &[MerkleStep]) -> Hash {
    path.iter().fold(*leaf, |acc, step| {
        if step.sibling_on_right {
            hash_pair(&acc, &step.sibling)
        } else {
            hash_pair(&step.sibling, &acc)
        }
    })
}
