//! Request hooks of the in-memory connection.
//!
//! Every kind except [`AccessQueryRequest`](trellis_request::AccessQueryRequest)
//! is supported; query planning is left to other sources.

use trellis_request::{
    BranchNode, CloneBranchRequest, CloneWorkspaceRequest, CopyBranchRequest, CreateNodeRequest,
    CreateWorkspaceRequest, DeleteBranchRequest, DeleteChildrenRequest, DestroyWorkspaceRequest,
    FullTextSearchRequest, GetWorkspacesRequest, HookResult, LockBranchRequest, MoveBranchRequest,
    MoveTarget, ReadAllChildrenRequest, ReadAllPropertiesRequest, ReadBlockOfChildrenRequest,
    ReadBranchRequest, ReadNextBlockOfChildrenRequest, ReadNodeRequest, ReadPropertyRequest,
    RemovePropertyRequest, RenameNodeRequest, RequestProcessor, SetPropertyRequest,
    UnlockBranchRequest, UpdatePropertiesRequest, UpdateValuesRequest, VerifyNodeExistsRequest,
    VerifyWorkspaceRequest,
};
use trellis_types::{Name, Value};

use crate::connection::InMemoryConnection;
use crate::error::MemoryError;

/// Column holding each hit's path in full-text search results.
pub const PATH_COLUMN: &str = "trellis:path";
/// Column holding each hit's score (number of matching values).
pub const SCORE_COLUMN: &str = "trellis:score";

impl RequestProcessor for InMemoryConnection {
    fn source_name(&self) -> &str {
        self.repository().source_name()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    fn read_node(&mut self, request: &mut ReadNodeRequest) -> HookResult {
        let outcome = self.repository().read(request.in_workspace(), |ws| {
            let id = ws.resolve(request.at())?;
            let properties: Vec<_> = ws.properties(id)?.values().cloned().collect();
            Ok((ws.location_of(id)?, properties, ws.child_locations(id)?))
        });
        self.finish_read(request, outcome, |request, (actual, properties, children)| {
            request.add_properties(properties)?;
            for child in children {
                request.add_child(child)?;
            }
            request.set_actual_location(actual)
        })
    }

    fn read_all_children(&mut self, request: &mut ReadAllChildrenRequest) -> HookResult {
        let outcome = self.repository().read(request.in_workspace(), |ws| {
            let id = ws.resolve(request.of())?;
            Ok((ws.location_of(id)?, ws.child_locations(id)?))
        });
        self.finish_read(request, outcome, |request, (actual, children)| {
            for child in children {
                request.add_child(child)?;
            }
            request.set_actual_location_of_node(actual)
        })
    }

    fn read_block_of_children(&mut self, request: &mut ReadBlockOfChildrenRequest) -> HookResult {
        let (start, count) = (request.starting_index(), request.count());
        let outcome = self.repository().read(request.in_workspace(), |ws| {
            let id = ws.resolve(request.of())?;
            let block = ws
                .children(id)?
                .iter()
                .skip(start)
                .take(count)
                .map(|&child| ws.location_of(child))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((ws.location_of(id)?, block))
        });
        self.finish_read(request, outcome, |request, (actual, block)| {
            for child in block {
                request.add_child(child)?;
            }
            request.set_actual_location_of_node(actual)
        })
    }

    fn read_next_block_of_children(
        &mut self,
        request: &mut ReadNextBlockOfChildrenRequest,
    ) -> HookResult {
        let count = request.count();
        let outcome = self.repository().read(request.in_workspace(), |ws| {
            let id = ws.resolve(request.starting_after())?;
            let parent = ws
                .parent_of(id)?
                .ok_or_else(|| MemoryError::invalid("the root node has no siblings"))?;
            let block = ws
                .children(parent)?
                .iter()
                .skip_while(|&&sibling| sibling != id)
                .skip(1)
                .take(count)
                .map(|&sibling| ws.location_of(sibling))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((ws.location_of(id)?, block))
        });
        self.finish_read(request, outcome, |request, (actual, block)| {
            for child in block {
                request.add_child(child)?;
            }
            request.set_actual_location_of_starting_after(actual)
        })
    }

    fn read_all_properties(&mut self, request: &mut ReadAllPropertiesRequest) -> HookResult {
        let outcome = self.repository().read(request.in_workspace(), |ws| {
            let id = ws.resolve(request.at())?;
            let properties: Vec<_> = ws.properties(id)?.values().cloned().collect();
            Ok((ws.location_of(id)?, properties, ws.children(id)?.len()))
        });
        self.finish_read(request, outcome, |request, (actual, properties, children)| {
            for property in properties {
                request.add_property(property)?;
            }
            request.set_number_of_children(children)?;
            request.set_actual_location(actual)
        })
    }

    fn read_property(&mut self, request: &mut ReadPropertyRequest) -> HookResult {
        let outcome = self.repository().read(request.in_workspace(), |ws| {
            let id = ws.resolve(request.on())?;
            let property = ws.properties(id)?.get(request.property_name()).cloned();
            Ok((ws.location_of(id)?, property))
        });
        self.finish_read(request, outcome, |request, (actual, property)| {
            if let Some(property) = property {
                request.set_property(property)?;
            }
            request.set_actual_location(actual)
        })
    }

    fn read_branch(&mut self, request: &mut ReadBranchRequest) -> HookResult {
        let max_depth = request.max_depth();
        let outcome = self.repository().read(request.in_workspace(), |ws| {
            let id = ws.resolve(request.at())?;
            let mut nodes = Vec::new();
            let mut stack = vec![(id, 1usize)];
            while let Some((node, depth)) = stack.pop() {
                nodes.push(BranchNode {
                    location: ws.location_of(node)?,
                    properties: ws.properties(node)?.clone(),
                    children: ws.child_locations(node)?,
                });
                if depth < max_depth {
                    stack.extend(ws.children(node)?.iter().rev().map(|&c| (c, depth + 1)));
                }
            }
            Ok((ws.location_of(id)?, nodes))
        });
        self.finish_read(request, outcome, |request, (actual, nodes)| {
            for node in nodes {
                request.add_node(node)?;
            }
            request.set_actual_location(actual)
        })
    }

    fn verify_node_exists(&mut self, request: &mut VerifyNodeExistsRequest) -> HookResult {
        let outcome = self.repository().read(request.in_workspace(), |ws| {
            let id = ws.resolve(request.at())?;
            ws.location_of(id)
        });
        self.finish_read(request, outcome, |request, actual| {
            request.set_actual_location(actual)
        })
    }

    fn verify_workspace(&mut self, request: &mut VerifyWorkspaceRequest) -> HookResult {
        let outcome = self.repository().verify_workspace(request.workspace_name());
        self.finish_read(request, outcome, |request, (name, root)| {
            request.set_actual_workspace_name(name)?;
            request.set_actual_root_location(root)
        })
    }

    fn get_workspaces(&mut self, request: &mut GetWorkspacesRequest) -> HookResult {
        let names = self.repository().workspace_names();
        self.finish_read(request, Ok(names), |request, names| {
            request.set_available_workspace_names(names)
        })
    }

    fn full_text_search(&mut self, request: &mut FullTextSearchRequest) -> HookResult {
        let (offset, limit) = (request.offset(), request.max_results().unwrap_or(usize::MAX));
        let outcome = self.repository().read(request.workspace(), |ws| {
            let expression = request.expression().trim();
            if expression.is_empty() {
                return Err(MemoryError::invalid("search expression is empty"));
            }
            let columns = vec![Name::new(PATH_COLUMN)?, Name::new(SCORE_COLUMN)?];
            let tuples = ws
                .search(expression)?
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|(path, score)| vec![Some(Value::Path(path)), Some(Value::Long(score))])
                .collect::<Vec<_>>();
            Ok((columns, tuples))
        });
        self.finish_read(request, outcome, |request, (columns, tuples)| {
            request.set_results(columns, tuples)
        })
    }

    // -----------------------------------------------------------------------
    // Node changes
    // -----------------------------------------------------------------------

    fn create_node(&mut self, request: &mut CreateNodeRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let parent = ws.resolve(request.under())?;
            let id = ws.create(
                parent,
                request.named().clone(),
                request.properties().to_vec(),
                request.conflict_behavior(),
            )?;
            ws.location_of(id)
        });
        self.finish(request, outcome, |request, actual| {
            request.set_actual_location_of_node(actual)
        })
    }

    fn update_properties(&mut self, request: &mut UpdatePropertiesRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let id = ws.resolve(request.on())?;
            ws.ensure_unlocked(id)?;
            let mut created = Vec::new();
            for (name, change) in request.properties() {
                match change {
                    Some(property) => {
                        if ws.set_property(id, property.clone())? {
                            created.push(name.clone());
                        }
                    }
                    None => {
                        ws.remove_property(id, name)?;
                    }
                }
            }
            Ok((ws.location_of(id)?, created))
        });
        self.finish(request, outcome, |request, (actual, created)| {
            request.set_created_properties(created)?;
            request.set_actual_location_of_node(actual)
        })
    }

    fn set_property(&mut self, request: &mut SetPropertyRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let id = ws.resolve(request.on())?;
            let created = ws.set_property(id, request.property().clone())?;
            Ok((ws.location_of(id)?, created))
        });
        self.finish(request, outcome, |request, (actual, created)| {
            request.set_new_property(created)?;
            request.set_actual_location_of_node(actual)
        })
    }

    fn remove_property(&mut self, request: &mut RemovePropertyRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let id = ws.resolve(request.from())?;
            ws.remove_property(id, request.property_name())?;
            ws.location_of(id)
        });
        self.finish(request, outcome, |request, actual| {
            request.set_actual_location_of_node(actual)
        })
    }

    fn update_values(&mut self, request: &mut UpdateValuesRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let id = ws.resolve(request.on())?;
            let (added, removed) = ws.update_values(
                id,
                request.property_name(),
                request.added_values(),
                request.removed_values(),
            )?;
            Ok((ws.location_of(id)?, added, removed))
        });
        self.finish(request, outcome, |request, (actual, added, removed)| {
            request.set_actual_location(actual, added, removed)
        })
    }

    fn rename_node(&mut self, request: &mut RenameNodeRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let id = ws.resolve(request.at())?;
            let before = ws.location_of(id)?;
            ws.rename(id, request.to_name().clone())?;
            Ok((before, ws.location_of(id)?))
        });
        self.finish(request, outcome, |request, (before, after)| {
            request.set_actual_locations(before, after)
        })
    }

    // -----------------------------------------------------------------------
    // Branch changes
    // -----------------------------------------------------------------------

    fn move_branch(&mut self, request: &mut MoveBranchRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let id = ws.resolve(request.from())?;
            let before = ws.location_of(id)?;
            if request.has_no_effect() {
                return Ok((before.clone(), before));
            }
            let (parent, sibling) = match request.target() {
                MoveTarget::Into(into) => (ws.resolve(into)?, None),
                MoveTarget::Before(location) => {
                    let sibling = ws.resolve(location)?;
                    let parent = ws
                        .parent_of(sibling)?
                        .ok_or_else(|| MemoryError::invalid("nothing can be moved before the root node"))?;
                    (parent, Some(sibling))
                }
            };
            ws.move_node(
                id,
                parent,
                sibling,
                request.desired_name().cloned(),
                request.conflict_behavior(),
            )?;
            Ok((before, ws.location_of(id)?))
        });
        self.finish(request, outcome, |request, (before, after)| {
            request.set_actual_locations(before, after)
        })
    }

    fn copy_branch(&mut self, request: &mut CopyBranchRequest) -> HookResult {
        let outcome = self.repository().copy_branch(
            request.from_workspace(),
            request.from(),
            request.destination_workspace(),
            request.destination(),
            request.desired_name(),
            request.conflict_behavior(),
        );
        self.finish(request, outcome, |request, copied| {
            request.set_actual_locations(copied.from, copied.into)
        })
    }

    fn clone_branch(&mut self, request: &mut CloneBranchRequest) -> HookResult {
        let outcome = self.repository().clone_branch(
            request.from_workspace(),
            request.from(),
            request.destination_workspace(),
            request.destination(),
            request.desired_name(),
            request.desired_segment(),
            request.remove_existing(),
        );
        self.finish(request, outcome, |request, cloned| {
            request.set_removed_existing_nodes(cloned.removed)?;
            request.set_actual_locations(cloned.from, cloned.into)
        })
    }

    fn delete_branch(&mut self, request: &mut DeleteBranchRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let id = ws.resolve(request.at())?;
            let actual = ws.location_of(id)?;
            ws.ensure_branch_unlocked(id)?;
            ws.remove_branch(id)?;
            Ok(actual)
        });
        self.finish(request, outcome, |request, actual| {
            request.set_actual_location_of_node(actual)
        })
    }

    fn delete_children(&mut self, request: &mut DeleteChildrenRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let id = ws.resolve(request.at())?;
            ws.ensure_branch_unlocked(id)?;
            let actual = ws.location_of(id)?;
            let deleted = ws.child_locations(id)?;
            for child in ws.children(id)?.to_vec() {
                ws.remove_branch(child)?;
            }
            Ok((actual, deleted))
        });
        self.finish(request, outcome, |request, (actual, deleted)| {
            for child in deleted {
                request.add_deleted_child(child)?;
            }
            request.set_actual_location_of_node(actual)
        })
    }

    fn lock_branch(&mut self, request: &mut LockBranchRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let id = ws.resolve(request.at())?;
            ws.lock(id, request.lock_scope())?;
            ws.location_of(id)
        });
        self.finish(request, outcome, |request, actual| {
            request.set_actual_location(actual)
        })
    }

    fn unlock_branch(&mut self, request: &mut UnlockBranchRequest) -> HookResult {
        let outcome = self.repository().write(request.in_workspace(), |ws| {
            let id = ws.resolve(request.at())?;
            ws.unlock(id)?;
            ws.location_of(id)
        });
        self.finish(request, outcome, |request, actual| {
            request.set_actual_location(actual)
        })
    }

    // -----------------------------------------------------------------------
    // Workspaces
    // -----------------------------------------------------------------------

    fn create_workspace(&mut self, request: &mut CreateWorkspaceRequest) -> HookResult {
        let outcome = self
            .repository()
            .create_workspace(request.desired_name(), request.conflict_behavior());
        self.finish(request, outcome, |request, (name, root)| {
            request.set_actual_workspace(name, root)
        })
    }

    fn clone_workspace(&mut self, request: &mut CloneWorkspaceRequest) -> HookResult {
        let outcome = self.repository().clone_workspace(
            request.name_of_workspace_to_be_cloned(),
            request.desired_name_of_target_workspace(),
            request.target_conflict_behavior(),
            request.clone_conflict_behavior(),
        );
        self.finish(request, outcome, |request, (name, root)| {
            request.set_actual_workspace(name, root)
        })
    }

    fn destroy_workspace(&mut self, request: &mut DestroyWorkspaceRequest) -> HookResult {
        let outcome = self.repository().destroy_workspace(request.workspace_name());
        self.finish(request, outcome, |request, root| {
            request.set_actual_root_location(root)
        })
    }
}
